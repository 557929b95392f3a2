// This module defines the canonical IR trees that instruction selection consumes. Expressions
// and statements are closed sum types so every visitor-like site in the backend is an exhaustive
// match. Trees are built once by the translator and only read afterwards. Temp is either a
// virtual register handed out by the compilation session or a fixed machine register named by
// the target frame; Label is a cheap-to-clone reference-counted name. RelOp carries the two
// operator transformations the muncher relies on: swapped() for operand transposition and
// negated() for logical inversion, plus holds() as the reference semantics used by tests.

//! Canonical IR trees.
//!
//! The translator hands one [`Stm`] per procedure to the code generator. The
//! tree is already canonical: no `ESEQ`, calls only at the top of a `MOVE` into
//! a temporary or an `EXP`, and every `CJUMP` is followed by its false label.

use std::fmt;
use std::rc::Rc;

pub mod frame;
pub mod text;

pub use frame::{DataFragment, Fragment, Frame, ProcFragment};

/// Symbolic register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Temp {
    /// Unbounded-supply virtual register, numbered by the session.
    Virtual(u32),
    /// Machine register that the allocator must not rename.
    Fixed(&'static str),
}

impl Temp {
    pub fn is_fixed(self) -> bool {
        matches!(self, Temp::Fixed(_))
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temp::Virtual(n) => write!(f, "t{n}"),
            Temp::Fixed(name) => write!(f, "{name}"),
        }
    }
}

/// Assembly-level name of a code or data location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Rc<str>);

impl Label {
    pub fn new(name: &str) -> Self {
        Label(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Minus,
    Mul,
    Div,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub const ALL: [BinOp; 7] = [
        BinOp::Plus,
        BinOp::Minus,
        BinOp::Mul,
        BinOp::Div,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            BinOp::Plus => "PLUS",
            BinOp::Minus => "MINUS",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Xor => "XOR",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relational operator of a `CJUMP` or `CMOVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl RelOp {
    pub const ALL: [RelOp; 10] = [
        RelOp::Eq,
        RelOp::Ne,
        RelOp::Lt,
        RelOp::Le,
        RelOp::Gt,
        RelOp::Ge,
        RelOp::Ult,
        RelOp::Ule,
        RelOp::Ugt,
        RelOp::Uge,
    ];

    /// Operator that gives the same answer with the operands exchanged:
    /// `a op b == b op.swapped() a`.
    ///
    /// This is not negation; `a < b` becomes `b > a`, never `!(b < a)`.
    pub const fn swapped(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Eq,
            RelOp::Ne => RelOp::Ne,
            RelOp::Lt => RelOp::Gt,
            RelOp::Le => RelOp::Ge,
            RelOp::Gt => RelOp::Lt,
            RelOp::Ge => RelOp::Le,
            RelOp::Ult => RelOp::Ugt,
            RelOp::Ule => RelOp::Uge,
            RelOp::Ugt => RelOp::Ult,
            RelOp::Uge => RelOp::Ule,
        }
    }

    /// Logical negation: `!(a op b) == a op.negated() b`.
    pub const fn negated(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
            RelOp::Ult => RelOp::Uge,
            RelOp::Ule => RelOp::Ugt,
            RelOp::Ugt => RelOp::Ule,
            RelOp::Uge => RelOp::Ult,
        }
    }

    /// Evaluate `a op b` on 64-bit words. Unsigned variants reinterpret the bits.
    pub fn holds(self, a: i64, b: i64) -> bool {
        let (ua, ub) = (a as u64, b as u64);
        match self {
            RelOp::Eq => a == b,
            RelOp::Ne => a != b,
            RelOp::Lt => a < b,
            RelOp::Le => a <= b,
            RelOp::Gt => a > b,
            RelOp::Ge => a >= b,
            RelOp::Ult => ua < ub,
            RelOp::Ule => ua <= ub,
            RelOp::Ugt => ua > ub,
            RelOp::Uge => ua >= ub,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RelOp::Eq => "EQ",
            RelOp::Ne => "NE",
            RelOp::Lt => "LT",
            RelOp::Le => "LE",
            RelOp::Gt => "GT",
            RelOp::Ge => "GE",
            RelOp::Ult => "ULT",
            RelOp::Ule => "ULE",
            RelOp::Ugt => "UGT",
            RelOp::Uge => "UGE",
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// IR expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exp {
    Const(i64),
    Name(Label),
    Temp(Temp),
    Mem(Box<Exp>),
    BinOp(BinOp, Box<Exp>, Box<Exp>),
    /// Call of `func` with `args`. Only `NAME` targets are supported by the backend.
    Call(Box<Exp>, Vec<Exp>),
}

impl Exp {
    pub fn mem(addr: Exp) -> Exp {
        Exp::Mem(Box::new(addr))
    }

    pub fn binop(op: BinOp, l: Exp, r: Exp) -> Exp {
        Exp::BinOp(op, Box::new(l), Box::new(r))
    }

    pub fn plus(l: Exp, r: Exp) -> Exp {
        Exp::binop(BinOp::Plus, l, r)
    }

    pub fn minus(l: Exp, r: Exp) -> Exp {
        Exp::binop(BinOp::Minus, l, r)
    }

    pub fn mul(l: Exp, r: Exp) -> Exp {
        Exp::binop(BinOp::Mul, l, r)
    }

    pub fn name(label: &str) -> Exp {
        Exp::Name(Label::new(label))
    }

    pub fn call(func: Exp, args: Vec<Exp>) -> Exp {
        Exp::Call(Box::new(func), args)
    }
}

/// IR statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stm {
    Label(Label),
    /// Unconditional jump. Only `NAME` targets are supported by the backend.
    Jump(Exp),
    CJump {
        op: RelOp,
        left: Exp,
        right: Exp,
        then_label: Label,
        else_label: Label,
    },
    /// `if left op right then dst := value`.
    CMove {
        op: RelOp,
        left: Exp,
        right: Exp,
        dst: Temp,
        value: Exp,
    },
    Move(Exp, Exp),
    /// Evaluate and discard.
    Exp(Exp),
    Seq(Vec<Stm>),
}

impl Stm {
    pub fn jump_to(label: &Label) -> Stm {
        Stm::Jump(Exp::Name(label.clone()))
    }

    pub fn cjump(op: RelOp, left: Exp, right: Exp, then_label: &Label, else_label: &Label) -> Stm {
        Stm::CJump {
            op,
            left,
            right,
            then_label: then_label.clone(),
            else_label: else_label.clone(),
        }
    }

    pub fn move_temp(dst: Temp, src: Exp) -> Stm {
        Stm::Move(Exp::Temp(dst), src)
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Const(i) => write!(f, "CONST({i})"),
            Exp::Name(l) => write!(f, "NAME({l})"),
            Exp::Temp(t) => write!(f, "TEMP({t})"),
            Exp::Mem(e) => write!(f, "MEM({e})"),
            Exp::BinOp(op, l, r) => write!(f, "{op}({l}, {r})"),
            Exp::Call(func, args) => {
                write!(f, "CALL({func}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Stm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stm::Label(l) => write!(f, "LABEL({l})"),
            Stm::Jump(e) => write!(f, "JUMP({e})"),
            Stm::CJump { op, left, right, then_label, else_label } => {
                write!(f, "CJUMP({op}, {left}, {right}, {then_label}, {else_label})")
            }
            Stm::CMove { op, left, right, dst, value } => {
                write!(f, "CMOVE({op}, {left}, {right}, TEMP({dst}), {value})")
            }
            Stm::Move(dst, src) => write!(f, "MOVE({dst}, {src})"),
            Stm::Exp(e) => write!(f, "EXP({e})"),
            Stm::Seq(stms) => {
                f.write_str("SEQ(")?;
                for (i, s) in stms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{s}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// An IR subtree of either category, carried by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrNode {
    Exp(Exp),
    Stm(Stm),
}

impl From<Exp> for IrNode {
    fn from(e: Exp) -> Self {
        IrNode::Exp(e)
    }
}

impl From<Stm> for IrNode {
    fn from(s: Stm) -> Self {
        IrNode::Stm(s)
    }
}

impl fmt::Display for IrNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrNode::Exp(e) => e.fmt(f),
            IrNode::Stm(s) => s.fmt(f),
        }
    }
}
