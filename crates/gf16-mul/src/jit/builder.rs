//! Instruction-set neutral description of the bit-plane XOR loop

use crate::tables::DepMasks;
use crate::Result;

/// Address bases available to generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Base {
    /// Current source block
    Src,
    /// Current destination block
    Dst,
    /// Temporary block below the stack pointer
    Stack,
}

/// Emitter for one vector instruction set.
///
/// `reg` indices are below [`CodeBuilder::REGISTERS`]; offsets are bytes from
/// the base. Aligned forms require the address to be a multiple of `WIDTH`.
pub(crate) trait CodeBuilder {
    type Label;

    /// Bytes per vector register (one plane of a block)
    const WIDTH: usize;
    const REGISTERS: usize;

    fn new_label(&mut self) -> Self::Label;
    fn bind(&mut self, label: &mut Self::Label) -> Result<()>;

    fn load(&mut self, reg: usize, base: Base, offset: usize) -> Result<()>;
    fn load_unaligned(&mut self, reg: usize, base: Base, offset: usize) -> Result<()>;
    /// reg ^= memory
    fn xor(&mut self, reg: usize, base: Base, offset: usize) -> Result<()>;
    fn store(&mut self, base: Base, offset: usize, reg: usize) -> Result<()>;
    fn store_unaligned(&mut self, base: Base, offset: usize, reg: usize) -> Result<()>;
    fn zero(&mut self, reg: usize) -> Result<()>;

    fn reserve_stack(&mut self, bytes: usize) -> Result<()>;
    fn release_stack(&mut self, bytes: usize) -> Result<()>;

    /// Move both the source and destination bases forward
    fn advance(&mut self, bytes: usize) -> Result<()>;
    /// Jump to `label` while the destination base is below the end pointer
    fn branch_while_below_end(&mut self, label: &Self::Label) -> Result<()>;

    /// Return sequence plus assembly
    fn finish(self) -> Result<Vec<u8>>;
}

/// Emit a loop computing, per bit-plane block, every output plane as the XOR
/// of the input planes its mask selects.
///
/// With `add` the destination plane is folded in. With `staged` the block is
/// assembled on the stack and copied out afterwards, so source and destination
/// may be the same block.
pub(crate) fn emit_xor_loop<B: CodeBuilder>(
    b: &mut B,
    deps: &DepMasks,
    add: bool,
    staged: bool,
) -> Result<()> {
    let w = B::WIDTH;
    let block = 16 * w;

    if staged {
        b.reserve_stack(block)?;
    }

    let mut top = b.new_label();
    b.bind(&mut top)?;

    for p in 0..16 {
        let reg = p % B::REGISTERS;
        let mut sources = deps.sources(p);

        if add {
            b.load(reg, Base::Dst, p * w)?;
        } else {
            match sources.next() {
                Some(q) => b.load(reg, Base::Src, q * w)?,
                None => b.zero(reg)?,
            }
        }
        for q in sources {
            b.xor(reg, Base::Src, q * w)?;
        }

        if staged {
            b.store_unaligned(Base::Stack, p * w, reg)?;
        } else {
            b.store(Base::Dst, p * w, reg)?;
        }
    }

    if staged {
        for p in 0..16 {
            let reg = p % B::REGISTERS;
            b.load_unaligned(reg, Base::Stack, p * w)?;
            b.store(Base::Dst, p * w, reg)?;
        }
    }

    b.advance(block)?;
    b.branch_while_below_end(&top)?;

    if staged {
        b.release_stack(block)?;
    }
    Ok(())
}
