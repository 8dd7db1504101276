//! Bit-plane XOR kernels
//!
//! In the bit-plane layout a multiply is a fixed 16x16 GF(2) matrix applied
//! to whole planes: output plane `p` is the XOR of the input planes selected
//! by `DepMasks[p]`. The static kernel walks the masks at run time; the JIT
//! kernel bakes them into straight-line code.

use super::RegionKernel;
use crate::multiplier::MutScratch;
use crate::tables::DepMasks;
use core::arch::x86_64::*;

/// Apply `deps` to every `16 * width` byte block.
///
/// Each 16-byte column of a block is fully computed before it is stored, so
/// `dst` may equal `src`.
#[target_feature(enable = "sse2")]
pub(super) unsafe fn xor_planes<const ADD: bool>(
    deps: &DepMasks,
    width: usize,
    dst: *mut u8,
    src: *const u8,
    len: usize,
) {
    let block = 16 * width;
    let mut out = [_mm_setzero_si128(); 16];

    let mut base = 0;
    while base < len {
        let mut col = 0;
        while col < width {
            for p in 0..16 {
                let mut acc = if ADD {
                    _mm_load_si128(dst.add(base + p * width + col).cast())
                } else {
                    _mm_setzero_si128()
                };
                let mut mask = deps.0[p];
                while mask != 0 {
                    let q = mask.trailing_zeros() as usize;
                    mask &= mask - 1;
                    acc = _mm_xor_si128(acc, _mm_load_si128(src.add(base + q * width + col).cast()));
                }
                out[p] = acc;
            }
            for (p, v) in out.iter().enumerate() {
                _mm_store_si128(dst.add(base + p * width + col).cast(), *v);
            }
            col += 16;
        }
        base += block;
    }
}

/// Precompiled bit-plane kernel for SSE2
pub(crate) struct XorKernel {
    width: usize,
}

impl XorKernel {
    pub(crate) fn new(width: usize) -> Self {
        Self { width }
    }
}

impl RegionKernel for XorKernel {
    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        xor_planes::<false>(&DepMasks::new(coeff), self.width, dst, src, len)
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        xor_planes::<true>(&DepMasks::new(coeff), self.width, dst, src, len)
    }
}

/// Generated bit-plane kernel; needs a scratch to hold the code and falls
/// back to [`xor_planes`] without one
#[cfg(all(feature = "jit", unix))]
pub(crate) struct XorJitKernel {
    isa: crate::jit::JitIsa,
}

#[cfg(all(feature = "jit", unix))]
impl XorJitKernel {
    pub(crate) fn new(isa: crate::jit::JitIsa) -> Self {
        Self { isa }
    }

    unsafe fn run<const ADD: bool>(
        &self,
        dst: *mut u8,
        src: *const u8,
        len: usize,
        coeff: u16,
        scratch: Option<&mut MutScratch>,
    ) {
        let deps = DepMasks::new(coeff);
        let width = self.isa.width();

        if let Some(scratch) = scratch {
            // overlapping blocks must be assembled off to the side
            let staged = (src as usize).abs_diff(dst as usize) < 16 * width;
            match scratch.jit.compile(self.isa, coeff, &deps, ADD, staged) {
                Ok(kernel) => return kernel(src, dst, dst.add(len)),
                Err(e) => {
                    tracing::warn!(error = %e, isa = ?self.isa, "xor kernel generation failed, using static kernel")
                }
            }
        }
        xor_planes::<ADD>(&deps, width, dst, src, len)
    }
}

#[cfg(all(feature = "jit", unix))]
impl RegionKernel for XorJitKernel {
    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, scratch: Option<&mut MutScratch>) {
        self.run::<false>(dst, src, len, coeff, scratch)
    }

    unsafe fn mul_add(
        &self,
        dst: *mut u8,
        src: *const u8,
        len: usize,
        coeff: u16,
        scratch: Option<&mut MutScratch>,
    ) {
        self.run::<true>(dst, src, len, coeff, scratch)
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

    fn planes(data: &[u8], width: usize) -> AlignedBuffer {
        let mut buf = AlignedBuffer::zeroed(data.len(), 64);
        Layout::BitPlanes { width }.prepare(&mut buf, data);
        buf
    }

    fn values(mut buf: AlignedBuffer, width: usize) -> Vec<u16> {
        Layout::BitPlanes { width }.finish(&mut buf);
        buf.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
    }

    fn data(n: usize) -> Vec<u8> {
        (0..n as u32).flat_map(|i| (i.wrapping_mul(0x2F1B) as u16).to_le_bytes()).collect()
    }

    #[test]
    fn test_static_kernel_all_widths() {
        let raw = data(512);
        let expect = |c: u16| -> Vec<u16> {
            raw.chunks_exact(2).map(|v| reference(u16::from_le_bytes([v[0], v[1]]), c)).collect()
        };
        for width in [16, 32, 64] {
            let kernel = XorKernel::new(width);
            let src = planes(&raw, width);
            let mut dst = AlignedBuffer::zeroed(raw.len(), 64);
            unsafe { kernel.mul(dst.as_mut_ptr(), src.as_ptr(), dst.len(), 0xD00D, None) };
            assert_eq!(values(dst, width), expect(0xD00D), "width {width}");
        }
    }

    #[test]
    fn test_static_kernel_in_place() {
        let raw = data(256);
        let mut buf = planes(&raw, 16);
        let p = buf.as_mut_ptr();
        unsafe { XorKernel::new(16).mul(p, p, buf.len(), 0x0002, None) };
        let got = values(buf, 16);
        for (o, v) in got.iter().zip(raw.chunks_exact(2)) {
            assert_eq!(*o, reference(u16::from_le_bytes([v[0], v[1]]), 2));
        }
    }

    #[cfg(all(feature = "jit", unix))]
    #[test]
    fn test_jit_matches_static() {
        use crate::jit::JitIsa;

        let mut isas = vec![JitIsa::Sse2];
        if is_x86_feature_detected!("avx2") {
            isas.push(JitIsa::Avx2);
        }
        if is_x86_feature_detected!("avx512f") {
            isas.push(JitIsa::Avx512);
        }

        let raw = data(1024);
        let mut scratch = MutScratch::new().unwrap();
        for isa in isas {
            let width = isa.width();
            let kernel = XorJitKernel::new(isa);
            let src = planes(&raw, width);
            for coeff in [3u16, 0x8000, 0xFFFF] {
                let mut jit = planes(&data(1024).into_iter().rev().collect::<Vec<_>>(), width);
                let mut fallback = jit.clone();
                unsafe {
                    kernel.mul_add(jit.as_mut_ptr(), src.as_ptr(), jit.len(), coeff, Some(&mut scratch));
                    xor_planes::<true>(&DepMasks::new(coeff), width, fallback.as_mut_ptr(), src.as_ptr(), src.len());
                }
                assert_eq!(&jit[..], &fallback[..], "{isa:?} coeff {coeff:#x}");
            }

            // in place goes through the staged variant
            let mut buf = src.clone();
            let p = buf.as_mut_ptr();
            unsafe { kernel.mul(p, p, buf.len(), 0x4321, Some(&mut scratch)) };
            let got = values(buf, width);
            for (o, v) in got.iter().zip(raw.chunks_exact(2)) {
                assert_eq!(*o, reference(u16::from_le_bytes([v[0], v[1]]), 0x4321), "{isa:?}");
            }
        }
    }
}
