// This module holds the interface between the translator and the code generator: the Frame
// trait a target implements for each procedure, and the procedure and data fragments that make
// up a compilation unit.

//! Frame descriptors and the fragments the translator produces.
//!
//! Frame layout and the calling convention belong to the translator; the code
//! generator only asks a [`Frame`] for the registers and argument locations it
//! needs to emit call sequences.

use super::{Exp, Label, Stm, Temp};
use std::fmt;

/// Target-specific view of one procedure activation.
pub trait Frame {
    /// Entry label of the procedure.
    fn name(&self) -> &Label;

    /// Size of a machine word in bytes.
    fn word_size(&self) -> i64;

    /// Register holding a call's return value.
    fn rv(&self) -> Temp;

    /// Location where a caller stores outgoing argument `index`.
    fn out_arg(&self, index: usize) -> Exp;

    /// Registers carrying the leading arguments, in argument order.
    fn arg_regs(&self) -> &[Temp];

    /// Registers a call may clobber.
    fn caller_saves(&self) -> &[Temp];

    /// Registers that stay live across every instruction (stack and frame pointers).
    fn specials(&self) -> &[Temp];
}

/// One procedure: its frame plus the full canonical body.
pub struct ProcFragment {
    pub frame: Box<dyn Frame>,
    pub body: Stm,
}

impl fmt::Debug for ProcFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcFragment")
            .field("frame", self.frame.name())
            .field("body", &self.body)
            .finish()
    }
}

/// Statically initialised data words under a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFragment {
    pub label: Label,
    pub words: Vec<Exp>,
}

#[derive(Debug)]
pub enum Fragment {
    Proc(ProcFragment),
    Data(DataFragment),
}

impl Fragment {
    pub fn name(&self) -> &Label {
        match self {
            Fragment::Proc(p) => p.frame.name(),
            Fragment::Data(d) => &d.label,
        }
    }
}
