//! x86-64 encodings of [`CodeBuilder`] via iced-x86
//!
//! Generated functions use the System V convention: `rdi` = source block,
//! `rsi` = destination block, `rdx` = end of destination.

use super::builder::{Base, CodeBuilder};
use crate::{Gf16Error, Result};
use iced_x86::code_asm::*;
use std::marker::PhantomData;

type AsmResult = std::result::Result<(), IcedError>;

fn asm_err(e: IcedError) -> Gf16Error {
    Gf16Error::Assemble(e.to_string())
}

fn base_reg(base: Base) -> AsmRegister64 {
    match base {
        Base::Src => rdi,
        Base::Dst => rsi,
        Base::Stack => rsp,
    }
}

fn disp(offset: usize) -> i32 {
    // offsets stay within one 1 KiB block
    offset as i32
}

/// Per-ISA register file and instruction choice
pub(crate) trait VecIsa {
    const WIDTH: usize;
    /// Needs `vzeroupper` before returning
    const VEX: bool;

    fn load(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand, aligned: bool) -> AsmResult;
    fn store(a: &mut CodeAssembler, mem: AsmMemoryOperand, reg: usize, aligned: bool) -> AsmResult;
    fn xor(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand) -> AsmResult;
    fn zero(a: &mut CodeAssembler, reg: usize) -> AsmResult;
}

fn xmm(i: usize) -> AsmRegisterXmm {
    [
        xmm0, xmm1, xmm2, xmm3, xmm4, xmm5, xmm6, xmm7, xmm8, xmm9, xmm10, xmm11, xmm12, xmm13,
        xmm14, xmm15,
    ][i]
}

fn ymm(i: usize) -> AsmRegisterYmm {
    [
        ymm0, ymm1, ymm2, ymm3, ymm4, ymm5, ymm6, ymm7, ymm8, ymm9, ymm10, ymm11, ymm12, ymm13,
        ymm14, ymm15,
    ][i]
}

fn zmm(i: usize) -> AsmRegisterZmm {
    [
        zmm0, zmm1, zmm2, zmm3, zmm4, zmm5, zmm6, zmm7, zmm8, zmm9, zmm10, zmm11, zmm12, zmm13,
        zmm14, zmm15,
    ][i]
}

pub(crate) struct Sse2;
pub(crate) struct Avx2;
pub(crate) struct Avx512;

impl VecIsa for Sse2 {
    const WIDTH: usize = 16;
    const VEX: bool = false;

    fn load(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand, aligned: bool) -> AsmResult {
        if aligned {
            a.movdqa(xmm(reg), xmmword_ptr(mem))
        } else {
            a.movdqu(xmm(reg), xmmword_ptr(mem))
        }
    }

    fn store(a: &mut CodeAssembler, mem: AsmMemoryOperand, reg: usize, aligned: bool) -> AsmResult {
        if aligned {
            a.movdqa(xmmword_ptr(mem), xmm(reg))
        } else {
            a.movdqu(xmmword_ptr(mem), xmm(reg))
        }
    }

    fn xor(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand) -> AsmResult {
        a.pxor(xmm(reg), xmmword_ptr(mem))
    }

    fn zero(a: &mut CodeAssembler, reg: usize) -> AsmResult {
        a.pxor(xmm(reg), xmm(reg))
    }
}

impl VecIsa for Avx2 {
    const WIDTH: usize = 32;
    const VEX: bool = true;

    fn load(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand, aligned: bool) -> AsmResult {
        if aligned {
            a.vmovdqa(ymm(reg), ymmword_ptr(mem))
        } else {
            a.vmovdqu(ymm(reg), ymmword_ptr(mem))
        }
    }

    fn store(a: &mut CodeAssembler, mem: AsmMemoryOperand, reg: usize, aligned: bool) -> AsmResult {
        if aligned {
            a.vmovdqa(ymmword_ptr(mem), ymm(reg))
        } else {
            a.vmovdqu(ymmword_ptr(mem), ymm(reg))
        }
    }

    fn xor(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand) -> AsmResult {
        a.vpxor(ymm(reg), ymm(reg), ymmword_ptr(mem))
    }

    fn zero(a: &mut CodeAssembler, reg: usize) -> AsmResult {
        a.vpxor(ymm(reg), ymm(reg), ymm(reg))
    }
}

impl VecIsa for Avx512 {
    const WIDTH: usize = 64;
    const VEX: bool = true;

    fn load(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand, aligned: bool) -> AsmResult {
        if aligned {
            a.vmovdqa64(zmm(reg), zmmword_ptr(mem))
        } else {
            a.vmovdqu64(zmm(reg), zmmword_ptr(mem))
        }
    }

    fn store(a: &mut CodeAssembler, mem: AsmMemoryOperand, reg: usize, aligned: bool) -> AsmResult {
        if aligned {
            a.vmovdqa64(zmmword_ptr(mem), zmm(reg))
        } else {
            a.vmovdqu64(zmmword_ptr(mem), zmm(reg))
        }
    }

    fn xor(a: &mut CodeAssembler, reg: usize, mem: AsmMemoryOperand) -> AsmResult {
        a.vpxorq(zmm(reg), zmm(reg), zmmword_ptr(mem))
    }

    fn zero(a: &mut CodeAssembler, reg: usize) -> AsmResult {
        a.vpxorq(zmm(reg), zmm(reg), zmm(reg))
    }
}

pub(crate) struct X86Builder<I: VecIsa> {
    asm: CodeAssembler,
    _isa: PhantomData<I>,
}

impl<I: VecIsa> X86Builder<I> {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self { asm: CodeAssembler::new(64).map_err(asm_err)?, _isa: PhantomData })
    }

    fn mem(base: Base, offset: usize) -> AsmMemoryOperand {
        base_reg(base) + disp(offset)
    }
}

impl<I: VecIsa> CodeBuilder for X86Builder<I> {
    type Label = CodeLabel;

    const WIDTH: usize = I::WIDTH;
    const REGISTERS: usize = 16;

    fn new_label(&mut self) -> CodeLabel {
        self.asm.create_label()
    }

    fn bind(&mut self, label: &mut CodeLabel) -> Result<()> {
        self.asm.set_label(label).map_err(asm_err)
    }

    fn load(&mut self, reg: usize, base: Base, offset: usize) -> Result<()> {
        I::load(&mut self.asm, reg, Self::mem(base, offset), true).map_err(asm_err)
    }

    fn load_unaligned(&mut self, reg: usize, base: Base, offset: usize) -> Result<()> {
        I::load(&mut self.asm, reg, Self::mem(base, offset), false).map_err(asm_err)
    }

    fn xor(&mut self, reg: usize, base: Base, offset: usize) -> Result<()> {
        I::xor(&mut self.asm, reg, Self::mem(base, offset)).map_err(asm_err)
    }

    fn store(&mut self, base: Base, offset: usize, reg: usize) -> Result<()> {
        I::store(&mut self.asm, Self::mem(base, offset), reg, true).map_err(asm_err)
    }

    fn store_unaligned(&mut self, base: Base, offset: usize, reg: usize) -> Result<()> {
        I::store(&mut self.asm, Self::mem(base, offset), reg, false).map_err(asm_err)
    }

    fn zero(&mut self, reg: usize) -> Result<()> {
        I::zero(&mut self.asm, reg).map_err(asm_err)
    }

    fn reserve_stack(&mut self, bytes: usize) -> Result<()> {
        self.asm.sub(rsp, disp(bytes)).map_err(asm_err)
    }

    fn release_stack(&mut self, bytes: usize) -> Result<()> {
        self.asm.add(rsp, disp(bytes)).map_err(asm_err)
    }

    fn advance(&mut self, bytes: usize) -> Result<()> {
        self.asm.add(rdi, disp(bytes)).map_err(asm_err)?;
        self.asm.add(rsi, disp(bytes)).map_err(asm_err)
    }

    fn branch_while_below_end(&mut self, label: &CodeLabel) -> Result<()> {
        self.asm.cmp(rsi, rdx).map_err(asm_err)?;
        self.asm.jb(*label).map_err(asm_err)
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        if I::VEX {
            self.asm.vzeroupper().map_err(asm_err)?;
        }
        self.asm.ret().map_err(asm_err)?;
        // only relative branches, so the code is position independent
        self.asm.assemble(0).map_err(asm_err)
    }
}
