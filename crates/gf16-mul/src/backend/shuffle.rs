//! Nibble-table shuffle kernels
//!
//! Each element is split into four nibbles; each nibble position has a
//! 16-byte table of the low and of the high product byte, looked up with one
//! byte shuffle. Data is in the split layout (a register of low bytes followed
//! by a register of high bytes), so the low and high results come out in
//! separate registers with no unpacking.

use super::vector::{ShuffleVector, Vector};
use super::RegionKernel;
use crate::multiplier::MutScratch;
use crate::tables::{NibbleTables, PolyTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShuffleIsa {
    #[cfg(target_arch = "x86_64")]
    Ssse3,
    /// 128-bit, VEX encoded
    #[cfg(target_arch = "x86_64")]
    Avx,
    #[cfg(target_arch = "x86_64")]
    Avx2,
    #[cfg(target_arch = "x86_64")]
    Avx512,
    #[cfg(target_arch = "aarch64")]
    Neon,
}

/// Nibble tables broadcast into registers
struct VecTables<V> {
    lo: [V; 4],
    hi: [V; 4],
}

impl<V: ShuffleVector> VecTables<V> {
    #[inline(always)]
    unsafe fn new(t: &NibbleTables) -> Self {
        Self {
            lo: [V::table(&t.lo[0]), V::table(&t.lo[1]), V::table(&t.lo[2]), V::table(&t.lo[3])],
            hi: [V::table(&t.hi[0]), V::table(&t.hi[1]), V::table(&t.hi[2]), V::table(&t.hi[3])],
        }
    }

    /// Product of one block given its low-byte and high-byte registers
    #[inline(always)]
    unsafe fn mul(&self, lo: V, hi: V) -> (V, V) {
        let (n0, n1) = lo.nibbles();
        let (n2, n3) = hi.nibbles();
        let out_lo = self.lo[0]
            .lookup(n0)
            .xor(self.lo[1].lookup(n1))
            .xor(self.lo[2].lookup(n2))
            .xor(self.lo[3].lookup(n3));
        let out_hi = self.hi[0]
            .lookup(n0)
            .xor(self.hi[1].lookup(n1))
            .xor(self.hi[2].lookup(n2))
            .xor(self.hi[3].lookup(n3));
        (out_lo, out_hi)
    }
}

#[inline(always)]
unsafe fn region<V: ShuffleVector, const ADD: bool>(
    t: &NibbleTables,
    dst: *mut u8,
    src: *const u8,
    len: usize,
) {
    let tables = VecTables::<V>::new(t);
    let mut off = 0;
    while off < len {
        let (mut lo, mut hi) =
            tables.mul(V::load(src.add(off)), V::load(src.add(off + V::BYTES)));
        if ADD {
            lo = lo.xor(V::load(dst.add(off)));
            hi = hi.xor(V::load(dst.add(off + V::BYTES)));
        }
        lo.store(dst.add(off));
        hi.store(dst.add(off + V::BYTES));
        off += 2 * V::BYTES;
    }
}

/// One pass over `dst` accumulating every source
#[inline(always)]
unsafe fn region_multi<V: ShuffleVector>(
    tables: &[NibbleTables],
    dst: *mut u8,
    srcs: &[*const u8],
    len: usize,
) {
    let mut regs = Vec::with_capacity(tables.len());
    for t in tables {
        regs.push(VecTables::<V>::new(t));
    }

    let mut off = 0;
    while off < len {
        let mut lo = V::load(dst.add(off));
        let mut hi = V::load(dst.add(off + V::BYTES));
        for (t, &src) in regs.iter().zip(srcs) {
            let (plo, phi) = t.mul(V::load(src.add(off)), V::load(src.add(off + V::BYTES)));
            lo = lo.xor(plo);
            hi = hi.xor(phi);
        }
        lo.store(dst.add(off));
        hi.store(dst.add(off + V::BYTES));
        off += 2 * V::BYTES;
    }
}

// target_feature entry points; the generic body is inlined into each
macro_rules! entry_points {
    ($single:ident, $multi:ident, $vec:ty, $features:literal) => {
        #[target_feature(enable = $features)]
        pub(super) unsafe fn $single<const ADD: bool>(
            t: &NibbleTables,
            dst: *mut u8,
            src: *const u8,
            len: usize,
        ) {
            region::<$vec, ADD>(t, dst, src, len)
        }

        #[target_feature(enable = $features)]
        pub(super) unsafe fn $multi(
            tables: &[NibbleTables],
            dst: *mut u8,
            srcs: &[*const u8],
            len: usize,
        ) {
            region_multi::<$vec>(tables, dst, srcs, len)
        }
    };
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::*;
    use crate::backend::vector::x86::{V128, V256, V512};

    entry_points!(ssse3, ssse3_multi, V128, "ssse3");
    entry_points!(avx, avx_multi, V128, "avx");
    entry_points!(avx2, avx2_multi, V256, "avx2");
    entry_points!(avx512, avx512_multi, V512, "avx512f,avx512bw");
}

#[cfg(target_arch = "aarch64")]
mod arm {
    use super::*;
    use crate::backend::vector::neon::Neon;

    entry_points!(neon, neon_multi, Neon, "neon");
}

pub(crate) struct ShuffleKernel {
    isa: ShuffleIsa,
    poly: PolyTables,
}

impl ShuffleKernel {
    pub(crate) fn new(isa: ShuffleIsa) -> Self {
        Self { isa, poly: PolyTables::new() }
    }

    unsafe fn run<const ADD: bool>(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16) {
        let t = NibbleTables::new(&self.poly, coeff);
        match self.isa {
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Ssse3 => x86::ssse3::<ADD>(&t, dst, src, len),
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Avx => x86::avx::<ADD>(&t, dst, src, len),
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Avx2 => x86::avx2::<ADD>(&t, dst, src, len),
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Avx512 => x86::avx512::<ADD>(&t, dst, src, len),
            #[cfg(target_arch = "aarch64")]
            ShuffleIsa::Neon => arm::neon::<ADD>(&t, dst, src, len),
        }
    }
}

impl RegionKernel for ShuffleKernel {
    fn has_multi_mul_add(&self) -> bool {
        true
    }

    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        self.run::<false>(dst, src, len, coeff)
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        self.run::<true>(dst, src, len, coeff)
    }

    unsafe fn mul_add_multi(
        &self,
        dst: *mut u8,
        srcs: &[*const u8],
        len: usize,
        coeffs: &[u16],
        _: Option<&mut MutScratch>,
    ) -> usize {
        // sources are taken in pairs; an odd one is left to the caller
        let handled = srcs.len() & !1;
        if handled == 0 {
            return 0;
        }
        let tables: Vec<NibbleTables> =
            coeffs[..handled].iter().map(|&c| NibbleTables::new(&self.poly, c)).collect();
        let srcs = &srcs[..handled];

        match self.isa {
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Ssse3 => x86::ssse3_multi(&tables, dst, srcs, len),
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Avx => x86::avx_multi(&tables, dst, srcs, len),
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Avx2 => x86::avx2_multi(&tables, dst, srcs, len),
            #[cfg(target_arch = "x86_64")]
            ShuffleIsa::Avx512 => x86::avx512_multi(&tables, dst, srcs, len),
            #[cfg(target_arch = "aarch64")]
            ShuffleIsa::Neon => arm::neon_multi(&tables, dst, srcs, len),
        }
        handled
    }
}

/// AVX2 kernel over 16-element blocks: one ymm holds the 16 low bytes in its
/// lower lane and the 16 high bytes in its upper lane. Accumulate only.
#[cfg(target_arch = "x86_64")]
pub(crate) struct Shuffle2xKernel {
    poly: PolyTables,
}

#[cfg(target_arch = "x86_64")]
impl Shuffle2xKernel {
    pub(crate) fn new() -> Self {
        Self { poly: PolyTables::new() }
    }
}

#[cfg(target_arch = "x86_64")]
impl RegionKernel for Shuffle2xKernel {
    fn has_mul(&self) -> bool {
        false
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        mul_add_2x_avx2(&NibbleTables::new(&self.poly, coeff), dst, src, len)
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn mul_add_2x_avx2(t: &NibbleTables, dst: *mut u8, src: *const u8, len: usize) {
    use core::arch::x86_64::*;

    let row = |t: &[u8; 16]| t.as_ptr().cast::<__m128i>();
    // lower lane indexed by the low byte's nibbles, upper lane by the high byte's
    let even_lo = _mm256_set_m128i(_mm_loadu_si128(row(&t.lo[2])), _mm_loadu_si128(row(&t.lo[0])));
    let odd_lo = _mm256_set_m128i(_mm_loadu_si128(row(&t.lo[3])), _mm_loadu_si128(row(&t.lo[1])));
    let even_hi = _mm256_set_m128i(_mm_loadu_si128(row(&t.hi[2])), _mm_loadu_si128(row(&t.hi[0])));
    let odd_hi = _mm256_set_m128i(_mm_loadu_si128(row(&t.hi[3])), _mm_loadu_si128(row(&t.hi[1])));
    let mask = _mm256_set1_epi8(0x0F);

    let mut off = 0;
    while off < len {
        let x = _mm256_load_si256(src.add(off).cast());
        let nib_lo = _mm256_and_si256(x, mask);
        let nib_hi = _mm256_and_si256(_mm256_srli_epi16(x, 4), mask);

        let prod_lo = _mm256_xor_si256(
            _mm256_shuffle_epi8(even_lo, nib_lo),
            _mm256_shuffle_epi8(odd_lo, nib_hi),
        );
        let prod_hi = _mm256_xor_si256(
            _mm256_shuffle_epi8(even_hi, nib_lo),
            _mm256_shuffle_epi8(odd_hi, nib_hi),
        );

        // fold the two lanes of each half together: [lo.0 ^ lo.1 | hi.0 ^ hi.1]
        let result = _mm256_xor_si256(
            _mm256_permute2x128_si256(prod_lo, prod_hi, 0x20),
            _mm256_permute2x128_si256(prod_lo, prod_hi, 0x31),
        );

        let d = dst.add(off).cast::<__m256i>();
        _mm256_store_si256(d, _mm256_xor_si256(result, _mm256_load_si256(d)));
        off += 32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;
    use crate::layout::Layout;
    use gf16_field::{BinaryFieldElement, Gf16};

    fn reference(v: u16, c: u16) -> u16 {
        Gf16::from_value(v).mul(&Gf16::from_value(c)).value()
    }

    fn sample(n: usize, seed: u32) -> Vec<u8> {
        (0..n as u32)
            .flat_map(|i| ((i.wrapping_add(seed).wrapping_mul(2_654_435_761) >> 16) as u16).to_le_bytes())
            .collect()
    }

    fn elements(buf: &[u8]) -> impl Iterator<Item = u16> + '_ {
        buf.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))
    }

    fn split(raw: &[u8], width: usize) -> AlignedBuffer {
        let mut buf = AlignedBuffer::zeroed(raw.len(), 64);
        Layout::Split { width }.prepare(&mut buf, raw);
        buf
    }

    fn available() -> Vec<(ShuffleIsa, usize)> {
        #[allow(unused_mut)]
        let mut isas = Vec::new();
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("ssse3") {
                isas.push((ShuffleIsa::Ssse3, 16));
            }
            if is_x86_feature_detected!("avx") {
                isas.push((ShuffleIsa::Avx, 16));
            }
            if is_x86_feature_detected!("avx2") {
                isas.push((ShuffleIsa::Avx2, 32));
            }
            if is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512bw") {
                isas.push((ShuffleIsa::Avx512, 64));
            }
        }
        #[cfg(target_arch = "aarch64")]
        isas.push((ShuffleIsa::Neon, 16));
        isas
    }

    #[test]
    fn test_shuffle_mul_and_mul_add() {
        let raw = sample(512, 1);
        let prev = sample(512, 99);
        for (isa, width) in available() {
            let kernel = ShuffleKernel::new(isa);
            for coeff in [2u16, 0x100B, 0xFFFF] {
                let src = split(&raw, width);
                let mut dst = AlignedBuffer::zeroed(raw.len(), 64);
                unsafe { kernel.mul(dst.as_mut_ptr(), src.as_ptr(), dst.len(), coeff, None) };
                Layout::Split { width }.finish(&mut dst);
                for (o, v) in elements(&dst).zip(elements(&raw)) {
                    assert_eq!(o, reference(v, coeff), "{isa:?}");
                }

                let mut acc = split(&prev, width);
                unsafe { kernel.mul_add(acc.as_mut_ptr(), src.as_ptr(), acc.len(), coeff, None) };
                Layout::Split { width }.finish(&mut acc);
                for ((o, v), p) in elements(&acc).zip(elements(&raw)).zip(elements(&prev)) {
                    assert_eq!(o, reference(v, coeff) ^ p, "{isa:?}");
                }
            }
        }
    }

    #[test]
    fn test_multi_takes_pairs() {
        let raws: Vec<Vec<u8>> = (0..3).map(|s| sample(256, s)).collect();
        let coeffs = [3u16, 0x8001, 0x4242];
        for (isa, width) in available() {
            let kernel = ShuffleKernel::new(isa);
            let srcs: Vec<AlignedBuffer> = raws.iter().map(|r| split(r, width)).collect();
            let ptrs: Vec<*const u8> = srcs.iter().map(|s| s.as_ptr()).collect();
            let mut dst = AlignedBuffer::zeroed(512, 64);

            let handled =
                unsafe { kernel.mul_add_multi(dst.as_mut_ptr(), &ptrs, dst.len(), &coeffs, None) };
            assert_eq!(handled, 2);

            Layout::Split { width }.finish(&mut dst);
            let expect = elements(&raws[0])
                .zip(elements(&raws[1]))
                .map(|(a, b)| reference(a, coeffs[0]) ^ reference(b, coeffs[1]));
            assert!(elements(&dst).eq(expect), "{isa:?}");
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_shuffle2x_accumulates() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let raw = sample(128, 7);
        let prev = sample(128, 8);
        let kernel = Shuffle2xKernel::new();
        assert!(!kernel.has_mul());

        let src = split(&raw, 16);
        let mut acc = split(&prev, 16);
        unsafe { kernel.mul_add(acc.as_mut_ptr(), src.as_ptr(), acc.len(), 0xBEEF, None) };
        Layout::Split { width: 16 }.finish(&mut acc);
        for ((o, v), p) in elements(&acc).zip(elements(&raw)).zip(elements(&prev)) {
            assert_eq!(o, reference(v, 0xBEEF) ^ p);
        }
    }
}
