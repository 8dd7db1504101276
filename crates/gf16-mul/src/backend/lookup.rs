//! Table-lookup kernels: per-byte tables, a 5/5/6-bit split, and an SSE2 store variant

use super::RegionKernel;
use crate::multiplier::MutScratch;
use crate::tables::{ByteTables, ThreePartTables};

#[inline(always)]
unsafe fn read_u16(p: *const u8) -> u16 {
    u16::from_le(p.cast::<u16>().read_unaligned())
}

#[inline(always)]
unsafe fn write_u16(p: *mut u8, v: u16) {
    p.cast::<u16>().write_unaligned(v.to_le())
}

/// Low-byte / high-byte tables, one element at a time
pub(crate) struct LookupKernel;

impl RegionKernel for LookupKernel {
    fn has_pow_add(&self) -> bool {
        true
    }

    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        let t = ByteTables::new(coeff);
        for off in (0..len).step_by(2) {
            write_u16(dst.add(off), t.mul(read_u16(src.add(off))));
        }
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        let t = ByteTables::new(coeff);
        for off in (0..len).step_by(2) {
            let d = dst.add(off);
            write_u16(d, read_u16(d) ^ t.mul(read_u16(src.add(off))));
        }
    }

    unsafe fn pow_add(&self, outputs: &[*mut u8], src: *const u8, len: usize, coeff: u16) {
        let t = ByteTables::new(coeff);
        for off in (0..len).step_by(2) {
            // walk the powers of coeff for this element once
            let mut v = read_u16(src.add(off));
            for &out in outputs {
                v = t.mul(v);
                let d = out.add(off);
                write_u16(d, read_u16(d) ^ v);
            }
        }
    }
}

/// Three smaller tables (32 + 32 + 64 entries), four elements per 64-bit word
pub(crate) struct Lookup3Kernel;

impl Lookup3Kernel {
    #[inline(always)]
    unsafe fn run<const ADD: bool>(dst: *mut u8, src: *const u8, len: usize, coeff: u16) {
        let t = ThreePartTables::new(coeff);
        for off in (0..len).step_by(8) {
            let word = u64::from_le(src.add(off).cast::<u64>().read_unaligned());
            let mut out = 0u64;
            for k in 0..4 {
                let v = (word >> (16 * k)) as u16;
                out |= (t.mul(v) as u64) << (16 * k);
            }
            let d = dst.add(off).cast::<u64>();
            if ADD {
                out ^= u64::from_le(d.read_unaligned());
            }
            d.write_unaligned(out.to_le());
        }
    }
}

impl RegionKernel for Lookup3Kernel {
    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        Self::run::<false>(dst, src, len, coeff)
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        Self::run::<true>(dst, src, len, coeff)
    }
}

/// Byte tables with results assembled and stored 128 bits at a time
#[cfg(target_arch = "x86_64")]
pub(crate) struct LookupSse2Kernel;

#[cfg(target_arch = "x86_64")]
impl RegionKernel for LookupSse2Kernel {
    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        lookup_sse2::<false>(&ByteTables::new(coeff), dst, src, len)
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        lookup_sse2::<true>(&ByteTables::new(coeff), dst, src, len)
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn lookup_sse2<const ADD: bool>(t: &ByteTables, dst: *mut u8, src: *const u8, len: usize) {
    use core::arch::x86_64::*;

    let mut off = 0;
    while off < len {
        let mut r = [0i16; 8];
        for (k, lane) in r.iter_mut().enumerate() {
            *lane = t.mul(read_u16(src.add(off + 2 * k))) as i16;
        }
        let mut v = _mm_set_epi16(r[7], r[6], r[5], r[4], r[3], r[2], r[1], r[0]);
        if ADD {
            v = _mm_xor_si128(v, _mm_load_si128(dst.add(off).cast()));
        }
        _mm_store_si128(dst.add(off).cast(), v);
        off += 16;
    }
}
