//! Runtime generation of bit-plane XOR kernels
//!
//! A coefficient's 16x16 bit matrix is turned into straight-line vector XORs
//! (one output plane at a time) wrapped in a loop over blocks. Code lives in a
//! per-caller [`JitScratch`] and is only regenerated when the coefficient or
//! the kind of call changes.

mod builder;
mod exec;
mod x86;

pub(crate) use exec::ExecMemory;

use crate::tables::DepMasks;
use crate::Result;
use builder::{emit_xor_loop, CodeBuilder};
use x86::{Avx2, Avx512, Sse2, VecIsa, X86Builder};

/// Room for the largest kernel (16 planes of 16 XORs plus staging)
const CODE_CAPACITY: usize = 16 * 1024;

/// Generated kernel: `(src, dst, dst_end)`, each a block-aligned pointer
pub(crate) type XorFn = unsafe extern "sysv64" fn(*const u8, *mut u8, *mut u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JitIsa {
    Sse2,
    Avx2,
    Avx512,
}

impl JitIsa {
    /// Plane width in bytes
    pub(crate) const fn width(self) -> usize {
        match self {
            JitIsa::Sse2 => Sse2::WIDTH,
            JitIsa::Avx2 => Avx2::WIDTH,
            JitIsa::Avx512 => Avx512::WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeKey {
    isa: JitIsa,
    coeff: u16,
    add: bool,
    staged: bool,
}

/// Executable buffer owned by one caller, holding at most one kernel
pub(crate) struct JitScratch {
    code: ExecMemory,
    loaded: Option<CodeKey>,
}

impl JitScratch {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self { code: ExecMemory::new(CODE_CAPACITY)?, loaded: None })
    }

    /// Kernel for the given parameters, generating it unless it is already loaded
    pub(crate) fn compile(
        &mut self,
        isa: JitIsa,
        coeff: u16,
        deps: &DepMasks,
        add: bool,
        staged: bool,
    ) -> Result<XorFn> {
        let key = CodeKey { isa, coeff, add, staged };
        if self.loaded != Some(key) {
            // a failed write leaves the buffer in an unknown state
            self.loaded = None;
            let code = match isa {
                JitIsa::Sse2 => generate::<Sse2>(deps, add, staged)?,
                JitIsa::Avx2 => generate::<Avx2>(deps, add, staged)?,
                JitIsa::Avx512 => generate::<Avx512>(deps, add, staged)?,
            };
            self.code.write(&code)?;
            self.loaded = Some(key);
            tracing::trace!(?isa, coeff, add, staged, bytes = code.len(), "generated xor kernel");
        }

        // SAFETY: the buffer holds a complete function with the XorFn signature
        Ok(unsafe { std::mem::transmute::<*const u8, XorFn>(self.code.as_ptr()) })
    }
}

fn generate<I: VecIsa>(deps: &DepMasks, add: bool, staged: bool) -> Result<Vec<u8>> {
    let mut b = X86Builder::<I>::new()?;
    emit_xor_loop(&mut b, deps, add, staged)?;
    b.finish()
}
