// This module maps relational operators onto x86-64 condition-code suffixes for conditional
// jumps and conditional moves, and back again.

//! Condition-code tables for `cmpq` followed by `jCC`/`cmovCC`.
//!
//! In AT&T syntax `cmpq B, A` sets the flags for `A - B`, so `jCC` is taken
//! when `A op B` holds. Immediates and memory operands can only sit in the
//! `B` slot. A rule that has to put the IR's left operand into `B` compares
//! the operands transposed and must use [`RelOp::swapped`], never the negation.

use crate::ir::RelOp;

/// Condition-code suffix for which `cmpq B, A; jCC` is taken iff `A op B`.
pub const fn cc(op: RelOp) -> &'static str {
    match op {
        RelOp::Eq => "e",
        RelOp::Ne => "ne",
        RelOp::Lt => "l",
        RelOp::Le => "le",
        RelOp::Gt => "g",
        RelOp::Ge => "ge",
        RelOp::Ult => "b",
        RelOp::Ule => "be",
        RelOp::Ugt => "a",
        RelOp::Uge => "ae",
    }
}

/// Branch mnemonic when the IR operands sit in their canonical slots.
pub fn jcc(op: RelOp) -> String {
    format!("j{}", cc(op))
}

pub fn cmovcc(op: RelOp) -> String {
    format!("cmov{}", cc(op))
}

/// Relational operator tested by a condition-code suffix. Inverse of [`cc`].
pub fn relop_of_cc(suffix: &str) -> Option<RelOp> {
    RelOp::ALL.into_iter().find(|op| cc(*op) == suffix)
}
