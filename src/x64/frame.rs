// This module provides the x86-64 frame descriptor the code generator consults while selecting
// call sequences. It encodes the System V AMD64 register roles: the first six integer arguments
// travel in RDI, RSI, RDX, RCX, R8 and R9, further arguments are stored to 8-byte slots at the
// bottom of the caller's outgoing area addressed from RSP, results come back in RAX, and RAX,
// RCX, RDX, RSI, RDI and R8-R11 may be clobbered by any call. RSP and RBP are special: they stay
// live everywhere and are never handed to the allocator. Frame layout proper (locals, spills,
// prologue and epilogue) is the translator's business; this type only answers the questions
// the Frame trait asks.

//! System V x86-64 frame descriptor.

use crate::ir::{Exp, Frame, Label, Temp};

pub const RAX: Temp = Temp::Fixed("%rax");
pub const RBX: Temp = Temp::Fixed("%rbx");
pub const RCX: Temp = Temp::Fixed("%rcx");
pub const RDX: Temp = Temp::Fixed("%rdx");
pub const RSI: Temp = Temp::Fixed("%rsi");
pub const RDI: Temp = Temp::Fixed("%rdi");
pub const RSP: Temp = Temp::Fixed("%rsp");
pub const RBP: Temp = Temp::Fixed("%rbp");
pub const R8: Temp = Temp::Fixed("%r8");
pub const R9: Temp = Temp::Fixed("%r9");
pub const R10: Temp = Temp::Fixed("%r10");
pub const R11: Temp = Temp::Fixed("%r11");
pub const R12: Temp = Temp::Fixed("%r12");
pub const R13: Temp = Temp::Fixed("%r13");
pub const R14: Temp = Temp::Fixed("%r14");
pub const R15: Temp = Temp::Fixed("%r15");

/// Integer argument registers in argument order.
pub const ARG_REGS: [Temp; 6] = [RDI, RSI, RDX, RCX, R8, R9];

/// Registers a callee may clobber.
pub const CALLER_SAVES: [Temp; 9] = [RAX, RCX, RDX, RSI, RDI, R8, R9, R10, R11];

/// Registers preserved across calls.
pub const CALLEE_SAVES: [Temp; 5] = [RBX, R12, R13, R14, R15];

pub const SPECIALS: [Temp; 2] = [RSP, RBP];

/// Every named general-purpose register.
pub const ALL_REGS: [Temp; 16] = [
    RAX, RBX, RCX, RDX, RSI, RDI, RSP, RBP, R8, R9, R10, R11, R12, R13, R14, R15,
];

pub const WORD_SIZE: i64 = 8;

/// Look up a register by its assembler name, with or without the `%`.
pub fn register(name: &str) -> Option<Temp> {
    let name = name.strip_prefix('%').unwrap_or(name);
    ALL_REGS.into_iter().find(|reg| match reg {
        Temp::Fixed(n) => &n[1..] == name,
        Temp::Virtual(_) => false,
    })
}

/// Frame of one x86-64 procedure.
#[derive(Debug, Clone)]
pub struct X86_64Frame {
    name: Label,
}

impl X86_64Frame {
    pub fn new(name: Label) -> Self {
        Self { name }
    }
}

impl Frame for X86_64Frame {
    fn name(&self) -> &Label {
        &self.name
    }

    fn word_size(&self) -> i64 {
        WORD_SIZE
    }

    fn rv(&self) -> Temp {
        RAX
    }

    fn out_arg(&self, index: usize) -> Exp {
        match ARG_REGS.get(index) {
            Some(reg) => Exp::Temp(*reg),
            None => {
                let slot = (index - ARG_REGS.len()) as i64 * self.word_size();
                Exp::mem(Exp::plus(Exp::Temp(RSP), Exp::Const(slot)))
            }
        }
    }

    fn arg_regs(&self) -> &[Temp] {
        &ARG_REGS
    }

    fn caller_saves(&self) -> &[Temp] {
        &CALLER_SAVES
    }

    fn specials(&self) -> &[Temp] {
        &SPECIALS
    }
}
