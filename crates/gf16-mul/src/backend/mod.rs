//! Kernel families behind the multiplier
//!
//! Every family implements [`RegionKernel`] over raw pointers; the safe slice
//! API in `multiplier` checks lengths, strides and alignment before calling in.
//! [`BackendImpl`] is the closed set of bound kernels.

#[cfg(target_arch = "x86_64")]
mod affine;
mod lookup;
mod shuffle;
mod vector;
#[cfg(target_arch = "x86_64")]
mod xor;

#[cfg(target_arch = "x86_64")]
pub(crate) use affine::{AffineIsa, AffineKernel};
#[cfg(target_arch = "x86_64")]
pub(crate) use lookup::LookupSse2Kernel;
pub(crate) use lookup::{Lookup3Kernel, LookupKernel};
#[cfg(target_arch = "x86_64")]
pub(crate) use shuffle::Shuffle2xKernel;
pub(crate) use shuffle::{ShuffleIsa, ShuffleKernel};
#[cfg(target_arch = "x86_64")]
pub(crate) use xor::XorKernel;
#[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
pub(crate) use xor::XorJitKernel;

use crate::method::MethodId;
use crate::multiplier::MutScratch;

/// One family of region kernels.
///
/// # Safety
///
/// For every `unsafe fn` here: `dst` and each source are valid for `len`
/// bytes, aligned and strided as the bound method requires, and `len > 0`.
/// `dst` may equal `src` only when [`RegionKernel::has_mul`] holds (for `mul`)
/// or never (for the accumulating operations).
pub(crate) trait RegionKernel {
    /// `mul` is a native kernel rather than zero-fill followed by `mul_add`
    fn has_mul(&self) -> bool {
        true
    }

    fn has_pow_add(&self) -> bool {
        false
    }

    fn has_multi_mul_add(&self) -> bool {
        false
    }

    /// dst := coeff * src
    unsafe fn mul(
        &self,
        dst: *mut u8,
        src: *const u8,
        len: usize,
        coeff: u16,
        scratch: Option<&mut MutScratch>,
    ) {
        core::ptr::write_bytes(dst, 0, len);
        self.mul_add(dst, src, len, coeff, scratch)
    }

    /// dst ^= coeff * src
    unsafe fn mul_add(
        &self,
        dst: *mut u8,
        src: *const u8,
        len: usize,
        coeff: u16,
        scratch: Option<&mut MutScratch>,
    );

    /// outputs[i] ^= coeff^(i+1) * src; only called when `has_pow_add`
    unsafe fn pow_add(&self, _outputs: &[*mut u8], _src: *const u8, _len: usize, _coeff: u16) {
        unreachable!("pow_add called on a kernel without a power-accumulate path")
    }

    /// dst ^= sum of coeffs[i] * srcs[i] for a prefix of the batch; returns its length
    unsafe fn mul_add_multi(
        &self,
        _dst: *mut u8,
        _srcs: &[*const u8],
        _len: usize,
        _coeffs: &[u16],
        _scratch: Option<&mut MutScratch>,
    ) -> usize {
        0
    }
}

/// Backend implementation enum (closed set, no trait objects)
pub(crate) enum BackendImpl {
    Lookup(LookupKernel),
    Lookup3(Lookup3Kernel),
    #[cfg(target_arch = "x86_64")]
    LookupSse2(LookupSse2Kernel),
    Shuffle(ShuffleKernel),
    #[cfg(target_arch = "x86_64")]
    Shuffle2x(Shuffle2xKernel),
    #[cfg(target_arch = "x86_64")]
    Affine(AffineKernel),
    #[cfg(target_arch = "x86_64")]
    Xor(XorKernel),
    #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
    XorJit(XorJitKernel),
}

impl BackendImpl {
    /// Kernel for `id`; the caller has already checked it is supported
    pub(crate) fn bind(id: MethodId) -> Self {
        match id {
            MethodId::Lookup => BackendImpl::Lookup(LookupKernel),
            MethodId::Lookup3 => BackendImpl::Lookup3(Lookup3Kernel),
            #[cfg(target_arch = "x86_64")]
            MethodId::LookupSse2 => BackendImpl::LookupSse2(LookupSse2Kernel),
            #[cfg(target_arch = "aarch64")]
            MethodId::ShuffleNeon => BackendImpl::Shuffle(ShuffleKernel::new(ShuffleIsa::Neon)),
            #[cfg(target_arch = "x86_64")]
            MethodId::ShuffleSsse3 => BackendImpl::Shuffle(ShuffleKernel::new(ShuffleIsa::Ssse3)),
            #[cfg(target_arch = "x86_64")]
            MethodId::ShuffleAvx => BackendImpl::Shuffle(ShuffleKernel::new(ShuffleIsa::Avx)),
            #[cfg(target_arch = "x86_64")]
            MethodId::ShuffleAvx2 => BackendImpl::Shuffle(ShuffleKernel::new(ShuffleIsa::Avx2)),
            #[cfg(target_arch = "x86_64")]
            MethodId::ShuffleAvx512 => BackendImpl::Shuffle(ShuffleKernel::new(ShuffleIsa::Avx512)),
            #[cfg(target_arch = "x86_64")]
            MethodId::Shuffle2xAvx2 => BackendImpl::Shuffle2x(Shuffle2xKernel::new()),
            #[cfg(target_arch = "x86_64")]
            MethodId::XorSse2 => BackendImpl::Xor(XorKernel::new(16)),
            #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
            MethodId::XorJitSse2 => BackendImpl::XorJit(XorJitKernel::new(crate::jit::JitIsa::Sse2)),
            #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
            MethodId::XorJitAvx2 => BackendImpl::XorJit(XorJitKernel::new(crate::jit::JitIsa::Avx2)),
            #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
            MethodId::XorJitAvx512 => {
                BackendImpl::XorJit(XorJitKernel::new(crate::jit::JitIsa::Avx512))
            }
            #[cfg(target_arch = "x86_64")]
            MethodId::AffineGfni => BackendImpl::Affine(AffineKernel::new(AffineIsa::Gfni)),
            #[cfg(target_arch = "x86_64")]
            MethodId::AffineAvx512 => BackendImpl::Affine(AffineKernel::new(AffineIsa::Avx512)),
            #[allow(unreachable_patterns)]
            other => {
                tracing::warn!(method = %other, "method not built for this target, using lookup");
                BackendImpl::Lookup(LookupKernel)
            }
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $k:ident => $body:expr) => {
        match $self {
            BackendImpl::Lookup($k) => $body,
            BackendImpl::Lookup3($k) => $body,
            #[cfg(target_arch = "x86_64")]
            BackendImpl::LookupSse2($k) => $body,
            BackendImpl::Shuffle($k) => $body,
            #[cfg(target_arch = "x86_64")]
            BackendImpl::Shuffle2x($k) => $body,
            #[cfg(target_arch = "x86_64")]
            BackendImpl::Affine($k) => $body,
            #[cfg(target_arch = "x86_64")]
            BackendImpl::Xor($k) => $body,
            #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
            BackendImpl::XorJit($k) => $body,
        }
    };
}

impl RegionKernel for BackendImpl {
    fn has_mul(&self) -> bool {
        dispatch!(self, k => k.has_mul())
    }

    fn has_pow_add(&self) -> bool {
        dispatch!(self, k => k.has_pow_add())
    }

    fn has_multi_mul_add(&self) -> bool {
        dispatch!(self, k => k.has_multi_mul_add())
    }

    unsafe fn mul(
        &self,
        dst: *mut u8,
        src: *const u8,
        len: usize,
        coeff: u16,
        scratch: Option<&mut MutScratch>,
    ) {
        dispatch!(self, k => k.mul(dst, src, len, coeff, scratch))
    }

    unsafe fn mul_add(
        &self,
        dst: *mut u8,
        src: *const u8,
        len: usize,
        coeff: u16,
        scratch: Option<&mut MutScratch>,
    ) {
        dispatch!(self, k => k.mul_add(dst, src, len, coeff, scratch))
    }

    unsafe fn pow_add(&self, outputs: &[*mut u8], src: *const u8, len: usize, coeff: u16) {
        dispatch!(self, k => k.pow_add(outputs, src, len, coeff))
    }

    unsafe fn mul_add_multi(
        &self,
        dst: *mut u8,
        srcs: &[*const u8],
        len: usize,
        coeffs: &[u16],
        scratch: Option<&mut MutScratch>,
    ) -> usize {
        dispatch!(self, k => k.mul_add_multi(dst, srcs, len, coeffs, scratch))
    }
}
