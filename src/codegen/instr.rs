// This module defines the abstract instructions produced by instruction selection. They are not
// encoded machine code: each carries an assembly template, the registers it defines and uses, the
// labels it may transfer to and whether control falls through. Register allocation reads the
// def/use lists and renders the final text through format_with once temporaries have names.

//! Abstract target instructions.
//!
//! An instruction is a textual template plus the symbolic registers and labels
//! it refers to. Placeholders are written `` `dN `` (Nth def), `` `sN `` (Nth
//! use) and `` `jN `` (Nth jump target). The operand lists are fixed when the
//! instruction is built; nothing mutates them afterwards.

use crate::ir::{Label, Temp};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Oper {
        assem: String,
        dst: Vec<Temp>,
        src: Vec<Temp>,
        jumps: Vec<Label>,
        /// Whether control can reach the next instruction in sequence.
        falls_through: bool,
    },
    /// Register-to-register copy, a coalescing candidate for the allocator.
    Move { assem: String, dst: Temp, src: Temp },
    Label { assem: String, label: Label },
}

impl Instr {
    /// Straight-line operation.
    pub fn oper(assem: impl Into<String>, dst: Vec<Temp>, src: Vec<Temp>) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst,
            src,
            jumps: Vec::new(),
            falls_through: true,
        }
    }

    /// Conditional branch: may go to any of `targets` or fall through.
    pub fn branch(assem: impl Into<String>, src: Vec<Temp>, targets: Vec<Label>) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst: Vec::new(),
            src,
            jumps: targets,
            falls_through: true,
        }
    }

    /// Unconditional jump: control only reaches `targets`.
    pub fn jump(assem: impl Into<String>, targets: Vec<Label>) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst: Vec::new(),
            src: Vec::new(),
            jumps: targets,
            falls_through: false,
        }
    }

    /// Leaves the procedure; no successor inside it.
    ///
    /// No rule selects it: bodies arrive with their epilogue already in IR form,
    /// and the pass that finishes the procedure after allocation appends the `ret`.
    pub fn ret(assem: impl Into<String>, src: Vec<Temp>) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst: Vec::new(),
            src,
            jumps: Vec::new(),
            falls_through: false,
        }
    }

    pub fn mov(assem: impl Into<String>, dst: Temp, src: Temp) -> Self {
        Instr::Move {
            assem: assem.into(),
            dst,
            src,
        }
    }

    pub fn label(assem: impl Into<String>, label: Label) -> Self {
        Instr::Label {
            assem: assem.into(),
            label,
        }
    }

    pub fn assem(&self) -> &str {
        match self {
            Instr::Oper { assem, .. } | Instr::Move { assem, .. } | Instr::Label { assem, .. } => {
                assem
            }
        }
    }

    /// Registers written.
    pub fn def(&self) -> &[Temp] {
        match self {
            Instr::Oper { dst, .. } => dst,
            Instr::Move { dst, .. } => std::slice::from_ref(dst),
            Instr::Label { .. } => &[],
        }
    }

    /// Registers read.
    pub fn use_(&self) -> &[Temp] {
        match self {
            Instr::Oper { src, .. } => src,
            Instr::Move { src, .. } => std::slice::from_ref(src),
            Instr::Label { .. } => &[],
        }
    }

    pub fn jumps(&self) -> &[Label] {
        match self {
            Instr::Oper { jumps, .. } => jumps,
            _ => &[],
        }
    }

    pub fn falls_through(&self) -> bool {
        match self {
            Instr::Oper { falls_through, .. } => *falls_through,
            _ => true,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Instr::Move { .. })
    }

    /// Label defined by this instruction, if it is a label.
    pub fn label_name(&self) -> Option<&Label> {
        match self {
            Instr::Label { label, .. } => Some(label),
            _ => None,
        }
    }

    /// First word of the template, used for statistics and tests.
    pub fn mnemonic(&self) -> &str {
        self.assem().split_whitespace().next().unwrap_or("")
    }

    /// Render the template, naming each register through `reg`.
    ///
    /// Out-of-range placeholders are left in the output verbatim so a
    /// malformed template is visible rather than silently dropped.
    pub fn format_with<F>(&self, reg: F) -> String
    where
        F: Fn(Temp) -> String,
    {
        let assem = self.assem();
        let mut out = String::with_capacity(assem.len() + 8);
        let mut chars = assem.char_indices().peekable();

        while let Some((start, ch)) = chars.next() {
            if ch != '`' {
                out.push(ch);
                continue;
            }
            let kind = chars.next_if(|(_, c)| matches!(c, 'd' | 's' | 'j')).map(|(_, c)| c);
            let mut index: Option<usize> = None;
            let mut end = start + 1 + kind.map_or(0, |_| 1);
            while let Some((pos, digit)) = chars.next_if(|(_, c)| c.is_ascii_digit()) {
                let value = digit.to_digit(10).unwrap_or(0) as usize;
                index = Some(index.unwrap_or(0) * 10 + value);
                end = pos + 1;
            }
            let resolved = match (kind, index) {
                (Some('d'), Some(i)) => self.def().get(i).map(|t| reg(*t)),
                (Some('s'), Some(i)) => self.use_().get(i).map(|t| reg(*t)),
                (Some('j'), Some(i)) => self.jumps().get(i).map(|l| l.to_string()),
                _ => None,
            };
            match resolved {
                Some(text) => out.push_str(&text),
                None => out.push_str(&assem[start..end]),
            }
        }
        out
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with(|t| t.to_string()))
    }
}
