//! The bound multiplier: one method, one uniform set of region operations

use crate::backend::{BackendImpl, RegionKernel};
use crate::buffer::AlignedBuffer;
use crate::caps::Caps;
use crate::layout::Layout;
use crate::method::{MethodHint, MethodId, MethodInfo};
use crate::select::{default_method, SelectionHints};
use std::fmt;

/// Per-thread working memory for methods that generate code at run time.
///
/// Never share one between concurrent callers; allocate one per worker with
/// [`Galois16Mul::mut_scratch_alloc`].
pub struct MutScratch {
    #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
    pub(crate) jit: crate::jit::JitScratch,
    _private: (),
}

impl MutScratch {
    #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
    pub(crate) fn new() -> crate::Result<Self> {
        Ok(Self { jit: crate::jit::JitScratch::new()?, _private: () })
    }
}

impl fmt::Debug for MutScratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutScratch").finish_non_exhaustive()
    }
}

/// Region multiplier bound to a single method.
///
/// Regions passed to the multiply operations must be non-empty, a multiple of
/// [`MethodInfo::stride`] long, aligned to [`MethodInfo::alignment`] and in the
/// method's working layout (see [`Galois16Mul::prepare`]). Violations panic.
pub struct Galois16Mul {
    info: MethodInfo,
    layout: Layout,
    backend: BackendImpl,
}

impl Galois16Mul {
    /// Bind using capabilities detected on this host
    pub fn new(hint: MethodHint) -> Self {
        Self::with_caps(hint, &Caps::detect())
    }

    /// Bind from the `GF16_METHOD` environment variable
    pub fn from_env() -> Self {
        Self::new(MethodHint::from_env())
    }

    /// Bind against an explicit capability record.
    ///
    /// A requested method the record does not support is replaced by the
    /// default for that record. The record only steers selection: a method the
    /// running processor cannot execute is never bound, whatever the record
    /// claims, and is re-resolved against the detected host instead.
    pub fn with_caps(hint: MethodHint, caps: &Caps) -> Self {
        let id = match hint {
            MethodHint::Auto => default_method(caps, &SelectionHints::default()),
            MethodHint::Method(id) if id.is_supported(caps) => id,
            MethodHint::Method(id) => {
                let fallback = default_method(caps, &SelectionHints::default());
                tracing::warn!(requested = %id, using = %fallback, "method not supported on this host");
                fallback
            }
        };
        Self::bind(Self::runnable(id))
    }

    fn runnable(id: MethodId) -> MethodId {
        if id.host_can_run() {
            return id;
        }
        let host = default_method(&Caps::detect(), &SelectionHints::default());
        let fallback = if host.host_can_run() { host } else { MethodId::Lookup };
        tracing::warn!(requested = %id, using = %fallback, "capability record claims features this processor lacks");
        fallback
    }

    fn bind(id: MethodId) -> Self {
        let info = MethodInfo::new(id);
        tracing::debug!(
            method = %id,
            alignment = info.alignment,
            stride = info.stride,
            "bound region multiplier"
        );
        Self { info, layout: id.layout(), backend: BackendImpl::bind(id) }
    }

    pub fn info(&self) -> &MethodInfo {
        &self.info
    }

    pub fn method(&self) -> MethodId {
        self.info.id
    }

    /// Whether data must go through [`prepare`](Self::prepare) / [`finish`](Self::finish)
    pub fn needs_prepare(&self) -> bool {
        !self.layout.is_native()
    }

    pub fn has_multi_mul_add(&self) -> bool {
        self.backend.has_multi_mul_add()
    }

    pub fn has_pow_add(&self) -> bool {
        self.backend.has_pow_add()
    }

    /// Length of the working buffer for `len` raw bytes (rounded up to the stride)
    pub fn prepared_len(&self, len: usize) -> usize {
        len.div_ceil(self.info.stride) * self.info.stride
    }

    /// Scratch for this method, or `None` when it needs none.
    ///
    /// Also `None` if executable memory cannot be mapped; the method then runs
    /// its static kernel.
    pub fn mut_scratch_alloc(&self) -> Option<MutScratch> {
        #[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
        if self.info.id.is_jit() {
            return match MutScratch::new() {
                Ok(scratch) => Some(scratch),
                Err(e) => {
                    tracing::warn!(method = %self.info.id, error = %e, "no code buffer, using static kernel");
                    None
                }
            };
        }
        None
    }

    pub fn mut_scratch_free(&self, scratch: MutScratch) {
        drop(scratch)
    }

    fn check_region(&self, region: &[u8]) {
        assert!(!region.is_empty(), "empty region");
        assert!(
            region.len() % self.info.stride == 0,
            "region length {} is not a multiple of the {} stride ({})",
            region.len(),
            self.info.name,
            self.info.stride
        );
        assert!(
            region.as_ptr() as usize % self.info.alignment == 0,
            "region is not aligned to {} bytes",
            self.info.alignment
        );
    }

    fn check_pair(&self, dst: &[u8], src: &[u8]) {
        assert_eq!(dst.len(), src.len(), "source and destination lengths differ");
        self.check_region(dst);
        self.check_region(src);
    }

    /// dst = coeff * src
    pub fn mul(&self, dst: &mut [u8], src: &[u8], coeff: u16, scratch: Option<&mut MutScratch>) {
        self.check_pair(dst, src);
        match coeff {
            0 => dst.fill(0),
            1 => dst.copy_from_slice(src),
            // SAFETY: regions checked above; &mut excludes aliasing
            _ => unsafe {
                self.backend.mul(dst.as_mut_ptr(), src.as_ptr(), dst.len(), coeff, scratch)
            },
        }
    }

    /// buf = coeff * buf
    pub fn mul_inplace(&self, buf: &mut [u8], coeff: u16, scratch: Option<&mut MutScratch>) {
        self.check_region(buf);
        match coeff {
            0 => buf.fill(0),
            1 => {}
            _ if self.backend.has_mul() => {
                let p = buf.as_mut_ptr();
                // SAFETY: native mul kernels read each block before writing it
                unsafe { self.backend.mul(p, p, buf.len(), coeff, scratch) }
            }
            _ => {
                let src = AlignedBuffer::from_slice(buf, self.info.alignment);
                buf.fill(0);
                // SAFETY: src is a separate allocation with the same length and alignment
                unsafe { self.backend.mul_add(buf.as_mut_ptr(), src.as_ptr(), buf.len(), coeff, scratch) }
            }
        }
    }

    /// dst ^= coeff * src
    pub fn mul_add(&self, dst: &mut [u8], src: &[u8], coeff: u16, scratch: Option<&mut MutScratch>) {
        self.check_pair(dst, src);
        match coeff {
            0 => {}
            1 => self.add(dst, src),
            // SAFETY: regions checked above; &mut excludes aliasing
            _ => unsafe {
                self.backend.mul_add(dst.as_mut_ptr(), src.as_ptr(), dst.len(), coeff, scratch)
            },
        }
    }

    fn check_outputs(&self, outputs: &[&mut [u8]], src: &[u8]) {
        assert!(!outputs.is_empty(), "no outputs");
        for out in outputs {
            self.check_pair(out, src);
        }
    }

    fn output_ptrs(outputs: &mut [&mut [u8]]) -> Vec<*mut u8> {
        outputs.iter_mut().map(|o| o.as_mut_ptr()).collect()
    }

    /// outputs[i] = coeff^(i+1) * src
    pub fn pow(&self, outputs: &mut [&mut [u8]], src: &[u8], coeff: u16, scratch: Option<&mut MutScratch>) {
        self.check_outputs(outputs, src);

        if self.backend.has_pow_add() {
            for out in outputs.iter_mut() {
                out.fill(0);
            }
            let ptrs = Self::output_ptrs(outputs);
            // SAFETY: every output checked against src; distinct &mut slices
            unsafe { self.backend.pow_add(&ptrs, src.as_ptr(), src.len(), coeff) };
            return;
        }

        let mut scratch = scratch;
        let Some((first, rest)) = outputs.split_first_mut() else {
            return;
        };
        let first: &mut [u8] = first;
        self.mul(first, src, coeff, scratch.as_deref_mut());
        let mut prev: &[u8] = first;
        for out in rest.iter_mut() {
            let out: &mut [u8] = out;
            self.mul(out, prev, coeff, scratch.as_deref_mut());
            prev = out;
        }
    }

    /// outputs[i] ^= coeff^(i+1) * src
    pub fn pow_add(&self, outputs: &mut [&mut [u8]], src: &[u8], coeff: u16, scratch: Option<&mut MutScratch>) {
        self.check_outputs(outputs, src);

        if self.backend.has_pow_add() {
            let ptrs = Self::output_ptrs(outputs);
            // SAFETY: every output checked against src; distinct &mut slices
            unsafe { self.backend.pow_add(&ptrs, src.as_ptr(), src.len(), coeff) };
            return;
        }

        let mut scratch = scratch;
        let mut power = AlignedBuffer::zeroed(src.len(), self.info.alignment);
        let mut next = AlignedBuffer::zeroed(src.len(), self.info.alignment);
        self.mul(&mut power, src, coeff, scratch.as_deref_mut());
        for (i, out) in outputs.iter_mut().enumerate() {
            if i > 0 {
                self.mul(&mut next, &power, coeff, scratch.as_deref_mut());
                std::mem::swap(&mut power, &mut next);
            }
            self.add(out, &power);
        }
    }

    /// dst ^= sum of coeffs[i] * srcs[i]
    pub fn mul_add_multi(
        &self,
        dst: &mut [u8],
        srcs: &[&[u8]],
        coeffs: &[u16],
        scratch: Option<&mut MutScratch>,
    ) {
        assert_eq!(srcs.len(), coeffs.len(), "one coefficient per source");
        for src in srcs {
            self.check_pair(dst, src);
        }

        let mut scratch = scratch;
        let mut handled = 0;
        if self.backend.has_multi_mul_add() && srcs.len() > 1 {
            let ptrs: Vec<*const u8> = srcs.iter().map(|s| s.as_ptr()).collect();
            // SAFETY: every source checked against dst
            handled = unsafe {
                self.backend.mul_add_multi(dst.as_mut_ptr(), &ptrs, dst.len(), coeffs, scratch.as_deref_mut())
            };
        }
        for (src, &coeff) in srcs[handled..].iter().zip(&coeffs[handled..]) {
            self.mul_add(dst, src, coeff, scratch.as_deref_mut());
        }
    }

    /// dst ^= src, in any layout
    pub fn add(&self, dst: &mut [u8], src: &[u8]) {
        assert_eq!(dst.len(), src.len(), "source and destination lengths differ");
        for (d, s) in dst.iter_mut().zip(src) {
            *d ^= s;
        }
    }

    /// Copy raw little-endian elements into `dst` in this method's layout.
    ///
    /// `dst.len()` must equal [`prepared_len`](Self::prepared_len)`(src.len())`;
    /// the padding is zeroed.
    pub fn prepare(&self, dst: &mut [u8], src: &[u8]) {
        assert!(src.len() % 2 == 0, "odd number of bytes");
        assert_eq!(dst.len(), self.prepared_len(src.len()), "destination is not the prepared length");
        self.layout.prepare(dst, src);
    }

    /// Convert a prepared buffer back to raw elements in place
    pub fn finish(&self, buf: &mut [u8]) {
        assert!(buf.len() % self.layout.block_len() == 0, "partial layout block");
        self.layout.finish(buf);
    }
}

impl fmt::Debug for Galois16Mul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Galois16Mul").field("method", &self.info.name).finish()
    }
}
