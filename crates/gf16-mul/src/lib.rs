//! Region multiplication in GF(2^16)
//!
//! Multiplies whole buffers of 16-bit field elements by a scalar coefficient at
//! memory bandwidth. A [`Galois16Mul`] is bound once to one of several
//! algorithmically distinct methods (table lookups, nibble shuffles, GFNI
//! affine transforms, bit-plane XOR networks and their runtime-generated
//! variant) and then exposes a single set of operations regardless of which
//! method is active.
//!
//! ```no_run
//! use gf16_mul::{Galois16Mul, MethodHint};
//!
//! let gf = Galois16Mul::new(MethodHint::Auto);
//! let raw = vec![1u8, 0, 2, 0, 3, 0, 4, 0];
//!
//! let len = gf.prepared_len(raw.len());
//! let mut src = gf16_mul::AlignedBuffer::zeroed(len, gf.info().alignment);
//! let mut dst = gf16_mul::AlignedBuffer::zeroed(len, gf.info().alignment);
//! gf.prepare(&mut src, &raw);
//!
//! let mut scratch = gf.mut_scratch_alloc();
//! gf.mul(&mut dst, &src, 0x1234, scratch.as_mut());
//! gf.finish(&mut dst);
//! ```
//!
//! # Methods
//!
//! - **Lookup**: per-byte (or 5/5/6-bit) product tables, portable
//! - **Shuffle**: 4-bit nibble tables applied with `pshufb` / `tbl`
//! - **Affine**: one `gf2p8affineqb` per byte pair (GFNI)
//! - **Xor**: bit-plane layout, each output plane XORs a fixed set of input planes
//! - **Xor-Jit**: the same XOR network emitted as straight-line machine code

mod backend;
mod buffer;
pub mod caps;
#[cfg(all(feature = "jit", target_arch = "x86_64", unix))]
mod jit;
mod layout;
pub mod method;
mod multiplier;
pub mod select;
mod tables;

pub use buffer::AlignedBuffer;
pub use caps::Caps;
pub use method::{MethodHint, MethodId, MethodInfo};
pub use multiplier::{Galois16Mul, MutScratch};
pub use select::{available_methods, available_methods_for, default_method, SelectionHints};

/// Error types for the multiplication engine
#[derive(Debug, thiserror::Error)]
pub enum Gf16Error {
    #[error("Unknown multiplication method: {0}")]
    UnknownMethod(String),

    #[error("Executable memory allocation failed: {0}")]
    ExecMemory(#[source] std::io::Error),

    #[error("Code assembly failed: {0}")]
    Assemble(String),

    #[error("Generated code is {size} bytes but the buffer holds {capacity}")]
    CodeTooLarge { size: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, Gf16Error>;
