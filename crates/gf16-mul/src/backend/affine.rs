//! GF2P8AFFINEQB kernels
//!
//! Multiplication by a constant is linear over GF(2), so each output byte of
//! the split layout is two 8x8 bit-matrix products: one against the low input
//! byte and one against the high input byte.

use super::vector::x86::{V128, V512};
use super::vector::AffineVector;
use super::RegionKernel;
use crate::multiplier::MutScratch;
use crate::tables::DepMasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AffineIsa {
    /// 128-bit, legacy encoding
    Gfni,
    /// 512-bit, EVEX encoding
    Avx512,
}

/// The four byte-to-byte matrices of one coefficient
#[derive(Debug, Clone, Copy)]
struct Matrices {
    lo_from_lo: u64,
    lo_from_hi: u64,
    hi_from_lo: u64,
    hi_from_hi: u64,
}

impl Matrices {
    fn new(coeff: u16) -> Self {
        let deps = DepMasks::new(coeff);
        Self {
            lo_from_lo: deps.affine_matrix(0, 0),
            lo_from_hi: deps.affine_matrix(0, 1),
            hi_from_lo: deps.affine_matrix(1, 0),
            hi_from_hi: deps.affine_matrix(1, 1),
        }
    }
}

#[inline(always)]
unsafe fn region<V: AffineVector, const ADD: bool>(m: &Matrices, dst: *mut u8, src: *const u8, len: usize) {
    let ll = V::matrix(m.lo_from_lo);
    let lh = V::matrix(m.lo_from_hi);
    let hl = V::matrix(m.hi_from_lo);
    let hh = V::matrix(m.hi_from_hi);

    let mut off = 0;
    while off < len {
        let lo = V::load(src.add(off));
        let hi = V::load(src.add(off + V::BYTES));
        let mut out_lo = lo.affine(ll).xor(hi.affine(lh));
        let mut out_hi = lo.affine(hl).xor(hi.affine(hh));
        if ADD {
            out_lo = out_lo.xor(V::load(dst.add(off)));
            out_hi = out_hi.xor(V::load(dst.add(off + V::BYTES)));
        }
        out_lo.store(dst.add(off));
        out_hi.store(dst.add(off + V::BYTES));
        off += 2 * V::BYTES;
    }
}

#[target_feature(enable = "gfni,ssse3")]
unsafe fn gfni<const ADD: bool>(m: &Matrices, dst: *mut u8, src: *const u8, len: usize) {
    region::<V128, ADD>(m, dst, src, len)
}

#[target_feature(enable = "gfni,avx512f,avx512bw")]
unsafe fn gfni_avx512<const ADD: bool>(m: &Matrices, dst: *mut u8, src: *const u8, len: usize) {
    region::<V512, ADD>(m, dst, src, len)
}

pub(crate) struct AffineKernel {
    isa: AffineIsa,
}

impl AffineKernel {
    pub(crate) fn new(isa: AffineIsa) -> Self {
        Self { isa }
    }

    unsafe fn run<const ADD: bool>(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16) {
        let m = Matrices::new(coeff);
        match self.isa {
            AffineIsa::Gfni => gfni::<ADD>(&m, dst, src, len),
            AffineIsa::Avx512 => gfni_avx512::<ADD>(&m, dst, src, len),
        }
    }
}

impl RegionKernel for AffineKernel {
    unsafe fn mul(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        self.run::<false>(dst, src, len, coeff)
    }

    unsafe fn mul_add(&self, dst: *mut u8, src: *const u8, len: usize, coeff: u16, _: Option<&mut MutScratch>) {
        self.run::<true>(dst, src, len, coeff)
    }
}
