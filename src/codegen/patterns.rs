// This module is the generic tree-pattern engine behind instruction selection. A pattern has
// the shape of an IR node; its leaves are literals, capture variables or guarded captures whose
// predicate must accept the value (for example the 1|2|4|8 scale factor of an indexed address).
// Capture variables are typed handles (Var<K>) handed out by a Vars allocator, so identities
// are unique within one rule table and a rule action reads its bindings back with the right
// Rust type. Matching walks pattern and node together left to right and returns None at the
// first disagreement; that failure is local to one rule attempt. A capture used twice inside
// one pattern is not compared between occurrences, which the engine does not support.

//! Tree patterns over IR nodes, with typed captures.
//!
//! ```ignore
//! let mut v = Vars::new();
//! let (l, i) = (v.exp("l"), v.int("i"));
//! let pat = plus(l, konst(i));
//! let m = pat.matches(&tree).unwrap();
//! let lhs: &Exp = m.get(l)?;
//! let imm: i64 = m.get(i)?;
//! ```

use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{BinOp, Exp, Label, RelOp, Stm, Temp};
use std::fmt;
use std::marker::PhantomData;

/// Identity of a capture variable.
pub type VarId = u32;

/// A value bound by a successful match. Borrows from the matched tree.
#[derive(Debug, Clone, Copy)]
pub enum Bound<'t> {
    Exp(&'t Exp),
    Exps(&'t [Exp]),
    Int(i64),
    Label(&'t Label),
    Temp(Temp),
    RelOp(RelOp),
    BinOp(BinOp),
}

/// What a capture variable can bind to.
pub trait Kind {
    type Value<'t>;

    fn extract<'t>(bound: Bound<'t>) -> Option<Self::Value<'t>>;
}

/// Kinds whose leaves can also be matched against a literal or a predicate.
pub trait Scalar: Kind {
    type Lit: PartialEq + fmt::Display;

    fn bind(lit: &Self::Lit) -> Bound<'_>;
}

pub enum ExpKind {}
pub enum ExpsKind {}
pub enum IntKind {}
pub enum LabelKind {}
pub enum TempKind {}
pub enum RelOpKind {}
pub enum BinOpKind {}

impl Kind for ExpKind {
    type Value<'t> = &'t Exp;

    fn extract<'t>(bound: Bound<'t>) -> Option<Self::Value<'t>> {
        match bound {
            Bound::Exp(e) => Some(e),
            _ => None,
        }
    }
}

impl Kind for ExpsKind {
    type Value<'t> = &'t [Exp];

    fn extract<'t>(bound: Bound<'t>) -> Option<Self::Value<'t>> {
        match bound {
            Bound::Exps(es) => Some(es),
            _ => None,
        }
    }
}

impl Kind for LabelKind {
    type Value<'t> = &'t Label;

    fn extract<'t>(bound: Bound<'t>) -> Option<Self::Value<'t>> {
        match bound {
            Bound::Label(l) => Some(l),
            _ => None,
        }
    }
}

impl Scalar for LabelKind {
    type Lit = Label;

    fn bind(lit: &Label) -> Bound<'_> {
        Bound::Label(lit)
    }
}

macro_rules! copy_scalar_kind {
    ($kind:ty, $lit:ty, $variant:ident) => {
        impl Kind for $kind {
            type Value<'t> = $lit;

            fn extract<'t>(bound: Bound<'t>) -> Option<Self::Value<'t>> {
                match bound {
                    Bound::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl Scalar for $kind {
            type Lit = $lit;

            fn bind(lit: &$lit) -> Bound<'_> {
                Bound::$variant(*lit)
            }
        }
    };
}

copy_scalar_kind!(IntKind, i64, Int);
copy_scalar_kind!(TempKind, Temp, Temp);
copy_scalar_kind!(RelOpKind, RelOp, RelOp);
copy_scalar_kind!(BinOpKind, BinOp, BinOp);

/// Typed handle of a capture variable.
pub struct Var<K> {
    id: VarId,
    name: &'static str,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for Var<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Var<K> {}

impl<K> fmt::Debug for Var<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl<K> Var<K> {
    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<K: Scalar> Var<K> {
    /// Capture that only matches values accepted by `guard`.
    pub fn such_that(self, guard: Guard<K>) -> Leaf<K> {
        Leaf::Guard(self, guard)
    }
}

/// Allocator of capture variables. One allocator per rule table keeps
/// identities unique across every pattern built from it.
#[derive(Debug, Default)]
pub struct Vars {
    next: VarId,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var<K: Kind>(&mut self, name: &'static str) -> Var<K> {
        let id = self.next;
        self.next += 1;
        Var {
            id,
            name,
            _kind: PhantomData,
        }
    }

    pub fn exp(&mut self, name: &'static str) -> Var<ExpKind> {
        self.var(name)
    }

    pub fn exps(&mut self, name: &'static str) -> Var<ExpsKind> {
        self.var(name)
    }

    pub fn int(&mut self, name: &'static str) -> Var<IntKind> {
        self.var(name)
    }

    pub fn label(&mut self, name: &'static str) -> Var<LabelKind> {
        self.var(name)
    }

    pub fn temp(&mut self, name: &'static str) -> Var<TempKind> {
        self.var(name)
    }

    pub fn relop(&mut self, name: &'static str) -> Var<RelOpKind> {
        self.var(name)
    }

    pub fn binop(&mut self, name: &'static str) -> Var<BinOpKind> {
        self.var(name)
    }
}

/// Validation predicate attached to a capture.
pub struct Guard<K: Scalar> {
    describe: &'static str,
    accepts: fn(&K::Lit) -> bool,
}

impl<K: Scalar> Guard<K> {
    pub const fn new(describe: &'static str, accepts: fn(&K::Lit) -> bool) -> Self {
        Self { describe, accepts }
    }

    pub fn accepts(&self, value: &K::Lit) -> bool {
        (self.accepts)(value)
    }
}

impl<K: Scalar> Clone for Guard<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: Scalar> Copy for Guard<K> {}

/// Scalar leaf of a pattern.
pub enum Leaf<K: Scalar> {
    /// Matches anything, binds nothing.
    Any,
    /// Matches exactly this value.
    Is(K::Lit),
    Bind(Var<K>),
    Guard(Var<K>, Guard<K>),
}

impl<K: Scalar> Leaf<K> {
    fn match_into<'t>(&self, lit: &'t K::Lit, m: &mut Matched<'t>) -> Option<()> {
        match self {
            Leaf::Any => Some(()),
            Leaf::Is(expected) => (expected == lit).then_some(()),
            Leaf::Bind(var) => {
                m.bind(var.id, var.name, K::bind(lit));
                Some(())
            }
            Leaf::Guard(var, guard) => {
                if !guard.accepts(lit) {
                    return None;
                }
                m.bind(var.id, var.name, K::bind(lit));
                Some(())
            }
        }
    }
}

impl<K: Scalar> From<Var<K>> for Leaf<K> {
    fn from(var: Var<K>) -> Self {
        Leaf::Bind(var)
    }
}

impl From<i64> for Leaf<IntKind> {
    fn from(value: i64) -> Self {
        Leaf::Is(value)
    }
}

impl From<RelOp> for Leaf<RelOpKind> {
    fn from(op: RelOp) -> Self {
        Leaf::Is(op)
    }
}

impl From<BinOp> for Leaf<BinOpKind> {
    fn from(op: BinOp) -> Self {
        Leaf::Is(op)
    }
}

impl<K: Scalar> fmt::Display for Leaf<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Any => f.write_str("_"),
            Leaf::Is(lit) => write!(f, "{lit}"),
            Leaf::Bind(var) => write!(f, "{}", var.name),
            Leaf::Guard(var, guard) => write!(f, "{}:{}", var.name, guard.describe),
        }
    }
}

/// Pattern over [`Exp`].
pub enum ExpPat {
    Any,
    Bind(Var<ExpKind>),
    Const(Leaf<IntKind>),
    Name(Leaf<LabelKind>),
    Temp(Leaf<TempKind>),
    Mem(Box<ExpPat>),
    BinOp(Leaf<BinOpKind>, Box<ExpPat>, Box<ExpPat>),
    Call(Box<ExpPat>, ArgsPat),
}

/// Pattern over a call's argument list.
pub enum ArgsPat {
    Any,
    Bind(Var<ExpsKind>),
}

/// Pattern over [`Stm`]. Sequences are flattened by the driver and have no pattern.
pub enum StmPat {
    Label(Leaf<LabelKind>),
    Jump(ExpPat),
    CJump {
        op: Leaf<RelOpKind>,
        left: ExpPat,
        right: ExpPat,
        then_label: Leaf<LabelKind>,
        else_label: Leaf<LabelKind>,
    },
    CMove {
        op: Leaf<RelOpKind>,
        left: ExpPat,
        right: ExpPat,
        dst: Leaf<TempKind>,
        value: ExpPat,
    },
    Move(ExpPat, ExpPat),
    Exp(ExpPat),
}

impl From<Var<ExpKind>> for ExpPat {
    fn from(var: Var<ExpKind>) -> Self {
        ExpPat::Bind(var)
    }
}

impl From<Var<ExpsKind>> for ArgsPat {
    fn from(var: Var<ExpsKind>) -> Self {
        ArgsPat::Bind(var)
    }
}

/// Bindings of one successful match, valid while the rule action runs.
#[derive(Debug, Default)]
pub struct Matched<'t> {
    bindings: Vec<(VarId, Bound<'t>)>,
}

impl<'t> Matched<'t> {
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    fn bind(&mut self, id: VarId, name: &'static str, value: Bound<'t>) {
        debug_assert!(
            self.bindings.iter().all(|(bound, _)| *bound != id),
            "capture `{name}` appears twice in one pattern"
        );
        self.bindings.push((id, value));
    }

    /// Value bound to `var`.
    pub fn get<K: Kind>(&self, var: Var<K>) -> CodegenResult<K::Value<'t>> {
        self.bindings
            .iter()
            .find(|(id, _)| *id == var.id)
            .and_then(|(_, bound)| K::extract(*bound))
            .ok_or(CodegenError::UnboundCapture { name: var.name })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A tree pattern over one IR category.
pub trait Pattern: fmt::Display {
    type Node;

    /// Match `node`, accumulating bindings into `m`. `None` is a local failure.
    fn match_into<'t>(&self, node: &'t Self::Node, m: &mut Matched<'t>) -> Option<()>;

    fn matches<'t>(&self, node: &'t Self::Node) -> Option<Matched<'t>> {
        let mut m = Matched::new();
        self.match_into(node, &mut m)?;
        Some(m)
    }
}

impl Pattern for ExpPat {
    type Node = Exp;

    fn match_into<'t>(&self, node: &'t Exp, m: &mut Matched<'t>) -> Option<()> {
        match (self, node) {
            (ExpPat::Any, _) => Some(()),
            (ExpPat::Bind(var), e) => {
                m.bind(var.id, var.name, Bound::Exp(e));
                Some(())
            }
            (ExpPat::Const(leaf), Exp::Const(i)) => leaf.match_into(i, m),
            (ExpPat::Name(leaf), Exp::Name(l)) => leaf.match_into(l, m),
            (ExpPat::Temp(leaf), Exp::Temp(t)) => leaf.match_into(t, m),
            (ExpPat::Mem(p), Exp::Mem(e)) => p.match_into(e, m),
            (ExpPat::BinOp(op, pl, pr), Exp::BinOp(o, l, r)) => {
                op.match_into(o, m)?;
                pl.match_into(l, m)?;
                pr.match_into(r, m)
            }
            (ExpPat::Call(pf, pargs), Exp::Call(func, args)) => {
                pf.match_into(func, m)?;
                match pargs {
                    ArgsPat::Any => Some(()),
                    ArgsPat::Bind(var) => {
                        m.bind(var.id, var.name, Bound::Exps(args.as_slice()));
                        Some(())
                    }
                }
            }
            _ => None,
        }
    }
}

impl Pattern for StmPat {
    type Node = Stm;

    fn match_into<'t>(&self, node: &'t Stm, m: &mut Matched<'t>) -> Option<()> {
        match (self, node) {
            (StmPat::Label(leaf), Stm::Label(l)) => leaf.match_into(l, m),
            (StmPat::Jump(p), Stm::Jump(e)) => p.match_into(e, m),
            (
                StmPat::CJump { op, left, right, then_label, else_label },
                Stm::CJump { op: o, left: l, right: r, then_label: t, else_label: f },
            ) => {
                op.match_into(o, m)?;
                left.match_into(l, m)?;
                right.match_into(r, m)?;
                then_label.match_into(t, m)?;
                else_label.match_into(f, m)
            }
            (
                StmPat::CMove { op, left, right, dst, value },
                Stm::CMove { op: o, left: l, right: r, dst: d, value: v },
            ) => {
                op.match_into(o, m)?;
                left.match_into(l, m)?;
                right.match_into(r, m)?;
                dst.match_into(d, m)?;
                value.match_into(v, m)
            }
            (StmPat::Move(pd, ps), Stm::Move(d, s)) => {
                pd.match_into(d, m)?;
                ps.match_into(s, m)
            }
            (StmPat::Exp(p), Stm::Exp(e)) => p.match_into(e, m),
            _ => None,
        }
    }
}

impl fmt::Display for ExpPat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpPat::Any => f.write_str("_"),
            ExpPat::Bind(var) => f.write_str(var.name),
            ExpPat::Const(leaf) => write!(f, "CONST({leaf})"),
            ExpPat::Name(leaf) => write!(f, "NAME({leaf})"),
            ExpPat::Temp(leaf) => write!(f, "TEMP({leaf})"),
            ExpPat::Mem(p) => write!(f, "MEM({p})"),
            ExpPat::BinOp(Leaf::Is(op), l, r) => write!(f, "{op}({l}, {r})"),
            ExpPat::BinOp(op, l, r) => write!(f, "BINOP({op}, {l}, {r})"),
            ExpPat::Call(func, ArgsPat::Any) => write!(f, "CALL({func}, _)"),
            ExpPat::Call(func, ArgsPat::Bind(var)) => write!(f, "CALL({func}, {}...)", var.name),
        }
    }
}

impl fmt::Display for StmPat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StmPat::Label(leaf) => write!(f, "LABEL({leaf})"),
            StmPat::Jump(p) => write!(f, "JUMP({p})"),
            StmPat::CJump { op, left, right, then_label, else_label } => {
                write!(f, "CJUMP({op}, {left}, {right}, {then_label}, {else_label})")
            }
            StmPat::CMove { op, left, right, dst, value } => {
                write!(f, "CMOVE({op}, {left}, {right}, TEMP({dst}), {value})")
            }
            StmPat::Move(d, s) => write!(f, "MOVE({d}, {s})"),
            StmPat::Exp(p) => write!(f, "EXP({p})"),
        }
    }
}

// Constructors mirroring the IR node names.

pub fn any() -> ExpPat {
    ExpPat::Any
}

pub fn konst(i: impl Into<Leaf<IntKind>>) -> ExpPat {
    ExpPat::Const(i.into())
}

pub fn name(l: impl Into<Leaf<LabelKind>>) -> ExpPat {
    ExpPat::Name(l.into())
}

pub fn temp(t: impl Into<Leaf<TempKind>>) -> ExpPat {
    ExpPat::Temp(t.into())
}

pub fn mem(e: impl Into<ExpPat>) -> ExpPat {
    ExpPat::Mem(Box::new(e.into()))
}

pub fn binop(op: impl Into<Leaf<BinOpKind>>, l: impl Into<ExpPat>, r: impl Into<ExpPat>) -> ExpPat {
    ExpPat::BinOp(op.into(), Box::new(l.into()), Box::new(r.into()))
}

pub fn plus(l: impl Into<ExpPat>, r: impl Into<ExpPat>) -> ExpPat {
    binop(BinOp::Plus, l, r)
}

pub fn minus(l: impl Into<ExpPat>, r: impl Into<ExpPat>) -> ExpPat {
    binop(BinOp::Minus, l, r)
}

pub fn mul(l: impl Into<ExpPat>, r: impl Into<ExpPat>) -> ExpPat {
    binop(BinOp::Mul, l, r)
}

pub fn call(func: impl Into<ExpPat>, args: impl Into<ArgsPat>) -> ExpPat {
    ExpPat::Call(Box::new(func.into()), args.into())
}

pub fn label(l: impl Into<Leaf<LabelKind>>) -> StmPat {
    StmPat::Label(l.into())
}

pub fn jump(target: impl Into<ExpPat>) -> StmPat {
    StmPat::Jump(target.into())
}

pub fn cjump(
    op: impl Into<Leaf<RelOpKind>>,
    left: impl Into<ExpPat>,
    right: impl Into<ExpPat>,
    then_label: impl Into<Leaf<LabelKind>>,
    else_label: impl Into<Leaf<LabelKind>>,
) -> StmPat {
    StmPat::CJump {
        op: op.into(),
        left: left.into(),
        right: right.into(),
        then_label: then_label.into(),
        else_label: else_label.into(),
    }
}

pub fn cmove(
    op: impl Into<Leaf<RelOpKind>>,
    left: impl Into<ExpPat>,
    right: impl Into<ExpPat>,
    dst: impl Into<Leaf<TempKind>>,
    value: impl Into<ExpPat>,
) -> StmPat {
    StmPat::CMove {
        op: op.into(),
        left: left.into(),
        right: right.into(),
        dst: dst.into(),
        value: value.into(),
    }
}

pub fn mov(dst: impl Into<ExpPat>, src: impl Into<ExpPat>) -> StmPat {
    StmPat::Move(dst.into(), src.into())
}

pub fn exp(e: impl Into<ExpPat>) -> StmPat {
    StmPat::Exp(e.into())
}
