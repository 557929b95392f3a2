// This module builds the x86-64 rule tables. Rules are registered most specific first because
// the muncher commits to the first pattern that matches: a zero constant before any constant,
// an immediate that fits a sign-extended 32-bit field before a register operand, a displacement
// or scaled-index address before a plain MEM. Comparisons come in six shapes (immediate right,
// immediate left, memory on both sides, memory right, memory left, registers) because cmpq only
// accepts an immediate or memory operand in its first AT&T slot. Whenever the IR's left operand
// has to take that slot the comparison is transposed and the relational operator replaced by
// its swapped form. Arithmetic rules copy their left operand into a fresh temporary before the
// two-address instruction so no IR temporary is ever overwritten behind the translator's back.

//! x86-64 instruction selection rules.

use super::cond::{cmovcc, jcc};
use super::frame::{RAX, RDX};
use crate::codegen::instr::Instr;
use crate::codegen::muncher::{Muncher, MuncherRules};
use crate::codegen::patterns::{
    self as p, ExpKind, ExpPat, Guard, IntKind, LabelKind, Leaf, Matched, RelOpKind, TempKind,
    Var, Vars,
};
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{BinOp, Exp, Label, RelOp, Stm, Temp};

fn fits_imm32(value: &i64) -> bool {
    i32::try_from(*value).is_ok()
}

fn is_scale(value: &i64) -> bool {
    matches!(value, 1 | 2 | 4 | 8)
}

/// Constants encodable as a sign-extended 32-bit immediate.
pub const IMM32: Guard<IntKind> = Guard::new("imm32", fits_imm32);

/// Index scale factors of an SIB address.
pub const SCALE: Guard<IntKind> = Guard::new("1|2|4|8", is_scale);

/// Build the complete x86-64 rule set.
pub fn x86_64_rules() -> MuncherRules {
    let mut vars = Vars::new();
    let mut rules = MuncherRules::new();
    add_statement_rules(&mut rules, &mut vars);
    add_value_rules(&mut rules, &mut vars);
    add_discard_rules(&mut rules, &mut vars);
    log::debug!(
        "x86-64 rules: {} statement, {} value, {} discard",
        rules.stm.len(),
        rules.exp.len(),
        rules.discard.len()
    );
    rules
}

/// Capture variables shared by the comparison rules.
#[derive(Clone, Copy)]
struct Compare {
    op: Var<RelOpKind>,
    a: Var<ExpKind>,
    b: Var<ExpKind>,
    imm: Var<IntKind>,
}

/// Operand shapes of a comparison, in priority order.
#[derive(Debug, Clone, Copy)]
enum Shape {
    RightImm,
    LeftImm,
    BothMem,
    RightMem,
    LeftMem,
    Regs,
}

impl Shape {
    const ALL: [Shape; 6] = [
        Shape::RightImm,
        Shape::LeftImm,
        Shape::BothMem,
        Shape::RightMem,
        Shape::LeftMem,
        Shape::Regs,
    ];

    fn operands(self, c: Compare) -> (ExpPat, ExpPat) {
        let imm = || p::konst(c.imm.such_that(IMM32));
        match self {
            Shape::RightImm => (c.a.into(), imm()),
            Shape::LeftImm => (imm(), c.b.into()),
            Shape::BothMem => (p::mem(c.a), p::mem(c.b)),
            Shape::RightMem => (c.a.into(), p::mem(c.b)),
            Shape::LeftMem => (p::mem(c.a), c.b.into()),
            Shape::Regs => (c.a.into(), c.b.into()),
        }
    }

    /// Emit the `cmpq` and return the operator the flags must be tested with.
    fn emit_compare(
        self,
        m: &mut Muncher<'_, '_>,
        caps: &Matched<'_>,
        c: Compare,
    ) -> CodegenResult<RelOp> {
        let op = caps.get(c.op)?;
        match self {
            Shape::RightImm => {
                let left = m.munch_exp(caps.get(c.a)?)?;
                let imm = caps.get(c.imm)?;
                m.emit(Instr::oper(format!("cmpq    ${imm}, `s0"), vec![], vec![left]));
                Ok(op)
            }
            Shape::LeftImm => {
                let right = m.munch_exp(caps.get(c.b)?)?;
                let imm = caps.get(c.imm)?;
                m.emit(Instr::oper(format!("cmpq    ${imm}, `s0"), vec![], vec![right]));
                Ok(op.swapped())
            }
            Shape::BothMem => {
                let left_addr = m.munch_exp(caps.get(c.a)?)?;
                let right_addr = m.munch_exp(caps.get(c.b)?)?;
                let left = m.new_temp();
                m.emit(Instr::oper("movq    (`s0), `d0", vec![left], vec![left_addr]));
                m.emit(Instr::oper("cmpq    (`s1), `s0", vec![], vec![left, right_addr]));
                Ok(op)
            }
            Shape::RightMem => {
                let left = m.munch_exp(caps.get(c.a)?)?;
                let right_addr = m.munch_exp(caps.get(c.b)?)?;
                m.emit(Instr::oper("cmpq    (`s1), `s0", vec![], vec![left, right_addr]));
                Ok(op)
            }
            Shape::LeftMem => {
                let left_addr = m.munch_exp(caps.get(c.a)?)?;
                let right = m.munch_exp(caps.get(c.b)?)?;
                m.emit(Instr::oper("cmpq    (`s1), `s0", vec![], vec![right, left_addr]));
                Ok(op.swapped())
            }
            Shape::Regs => {
                let left = m.munch_exp(caps.get(c.a)?)?;
                let right = m.munch_exp(caps.get(c.b)?)?;
                m.emit(Instr::oper("cmpq    `s1, `s0", vec![], vec![left, right]));
                Ok(op)
            }
        }
    }
}

/// Evaluate the arguments, then store them into their outgoing slots and emit the call.
///
/// Both passes run highest index first. No argument code runs once the first
/// slot is written, so a computation that clobbers an argument register (the
/// `%rdx` of a division, the `%rax` of a nested call) cannot destroy a value
/// already in place. Constants and labels read no registers and are stored as is.
fn emit_call(m: &mut Muncher<'_, '_>, func: &Label, args: &[Exp]) -> CodegenResult<()> {
    let frame = m.frame();
    let mut staged = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate().rev() {
        let value = match arg {
            Exp::Const(_) | Exp::Name(_) => arg.clone(),
            _ => {
                let mut value = m.munch_exp(arg)?;
                if value.is_fixed() {
                    let copy = m.new_temp();
                    m.emit(Instr::mov("movq    `s0, `d0", copy, value));
                    value = copy;
                }
                Exp::Temp(value)
            }
        };
        staged.push((index, value));
    }
    for (index, value) in staged {
        m.munch_stm(&Stm::Move(frame.out_arg(index), value))?;
    }

    let arg_regs = frame.arg_regs();
    let passed = &arg_regs[..args.len().min(arg_regs.len())];

    let mut defs = frame.caller_saves().to_vec();
    for reg in passed {
        if !defs.contains(reg) {
            defs.push(*reg);
        }
    }
    let mut uses = frame.specials().to_vec();
    uses.extend_from_slice(passed);

    m.emit(Instr::oper(format!("call    {func}"), defs, uses));
    Ok(())
}

/// Copy `src` into a fresh temporary and apply a one-operand instruction to it.
fn read_modify_write(m: &mut Muncher<'_, '_>, src: &Exp, template: String) -> CodegenResult<Temp> {
    let value = m.munch_exp(src)?;
    let dst = m.new_temp();
    m.emit(Instr::mov("movq    `s0, `d0", dst, value));
    m.emit(Instr::oper(template, vec![dst], vec![dst]));
    Ok(dst)
}

/// `dst := left; dst op= right` for a two-address instruction.
fn two_address(
    m: &mut Muncher<'_, '_>,
    mnemonic: &str,
    left: &Exp,
    right: &Exp,
) -> CodegenResult<Temp> {
    let l = m.munch_exp(left)?;
    let r = m.munch_exp(right)?;
    let dst = m.new_temp();
    m.emit(Instr::mov("movq    `s0, `d0", dst, l));
    m.emit(Instr::oper(format!("{mnemonic:<8}`s0, `d0"), vec![dst], vec![r, dst]));
    Ok(dst)
}

/// Three-operand `imulq` with an immediate multiplier.
fn imul_imm(m: &mut Muncher<'_, '_>, src: &Exp, imm: i64) -> CodegenResult<Temp> {
    let value = m.munch_exp(src)?;
    let dst = m.new_temp();
    m.emit(Instr::oper(format!("imulq   ${imm}, `s0, `d0"), vec![dst], vec![value]));
    Ok(dst)
}

fn add_statement_rules(rules: &mut MuncherRules, v: &mut Vars) {
    let stm = &mut rules.stm;
    let (l, target) = (v.label("l"), v.exp("target"));
    let (d, e, a, b) = (v.temp("d"), v.exp("e"), v.exp("a"), v.exp("b"));
    let (i, j, scale) = (v.int("i"), v.int("j"), v.int("s"));
    let (base, index) = (v.exp("base"), v.exp("index"));

    stm.add(p::label(l), move |m, c| {
        let label = c.get(l)?;
        m.emit(Instr::label(format!("{label}:"), label.clone()));
        Ok(())
    });

    stm.add(p::jump(p::name(l)), move |m, c| {
        m.emit(Instr::jump("jmp     `j0", vec![c.get(l)?.clone()]));
        Ok(())
    });
    stm.add(p::jump(target), move |_, c| {
        Err(CodegenError::unsupported(
            "indirect jump",
            Stm::Jump(c.get(target)?.clone()),
        ))
    });

    let cmp = Compare {
        op: v.relop("op"),
        a: v.exp("a"),
        b: v.exp("b"),
        imm: v.int("imm"),
    };
    let (then_label, else_label) = (v.label("then"), v.label("else"));
    for shape in Shape::ALL {
        let (left, right) = shape.operands(cmp);
        stm.add(
            p::cjump(cmp.op, left, right, then_label, else_label),
            move |m, c| {
                let op = shape.emit_compare(m, c, cmp)?;
                let targets = vec![c.get(then_label)?.clone(), c.get(else_label)?.clone()];
                m.emit(Instr::branch(format!("{:<8}`j0", jcc(op)), vec![], targets));
                Ok(())
            },
        );
    }

    // The value is computed first so nothing clobbers the flags between cmpq and cmovCC.
    let (dst, value) = (v.temp("dst"), v.exp("value"));
    for shape in Shape::ALL {
        let (left, right) = shape.operands(cmp);
        stm.add(p::cmove(cmp.op, left, right, dst, value), move |m, c| {
            let src = m.munch_exp(c.get(value)?)?;
            let op = shape.emit_compare(m, c, cmp)?;
            let dst = c.get(dst)?;
            m.emit(Instr::oper(
                format!("{:<8}`s0, `d0", cmovcc(op)),
                vec![dst],
                vec![src, dst],
            ));
            Ok(())
        });
    }

    stm.add(p::mov(p::temp(d), p::konst(0i64)), move |m, c| {
        m.emit(Instr::oper("xorq    `d0, `d0", vec![c.get(d)?], vec![]));
        Ok(())
    });
    stm.add(p::mov(p::temp(d), p::konst(i)), move |m, c| {
        let imm = c.get(i)?;
        m.emit(Instr::oper(format!("movq    ${imm}, `d0"), vec![c.get(d)?], vec![]));
        Ok(())
    });
    stm.add(
        p::mov(p::temp(d), p::plus(e, p::konst(i.such_that(IMM32)))),
        move |m, c| {
            let base = m.munch_exp(c.get(e)?)?;
            let disp = c.get(i)?;
            m.emit(Instr::oper(format!("leaq    {disp}(`s0), `d0"), vec![c.get(d)?], vec![base]));
            Ok(())
        },
    );
    stm.add(p::mov(p::temp(d), p::plus(a, b)), move |m, c| {
        let base = m.munch_exp(c.get(a)?)?;
        let index = m.munch_exp(c.get(b)?)?;
        m.emit(Instr::oper("leaq    (`s0,`s1), `d0", vec![c.get(d)?], vec![base, index]));
        Ok(())
    });
    stm.add(
        p::mov(
            p::temp(d),
            p::mem(p::plus(base, p::mul(index, p::konst(scale.such_that(SCALE))))),
        ),
        move |m, c| {
            let b = m.munch_exp(c.get(base)?)?;
            let x = m.munch_exp(c.get(index)?)?;
            let s = c.get(scale)?;
            m.emit(Instr::oper(format!("movq    (`s0,`s1,{s}), `d0"), vec![c.get(d)?], vec![b, x]));
            Ok(())
        },
    );
    stm.add(
        p::mov(p::temp(d), p::mem(p::plus(e, p::konst(i.such_that(IMM32))))),
        move |m, c| {
            let base = m.munch_exp(c.get(e)?)?;
            let disp = c.get(i)?;
            m.emit(Instr::oper(format!("movq    {disp}(`s0), `d0"), vec![c.get(d)?], vec![base]));
            Ok(())
        },
    );
    stm.add(p::mov(p::temp(d), p::mem(e)), move |m, c| {
        let addr = m.munch_exp(c.get(e)?)?;
        m.emit(Instr::oper("movq    (`s0), `d0", vec![c.get(d)?], vec![addr]));
        Ok(())
    });
    stm.add(p::mov(p::temp(d), e), move |m, c| {
        let src = m.munch_exp(c.get(e)?)?;
        m.emit(Instr::mov("movq    `s0, `d0", c.get(d)?, src));
        Ok(())
    });

    stm.add(
        p::mov(
            p::mem(p::plus(a, p::konst(i.such_that(IMM32)))),
            p::konst(j.such_that(IMM32)),
        ),
        move |m, c| {
            let base = m.munch_exp(c.get(a)?)?;
            let (disp, imm) = (c.get(i)?, c.get(j)?);
            m.emit(Instr::oper(format!("movq    ${imm}, {disp}(`s0)"), vec![], vec![base]));
            Ok(())
        },
    );
    stm.add(
        p::mov(p::mem(p::plus(a, p::konst(i.such_that(IMM32)))), b),
        move |m, c| {
            let base = m.munch_exp(c.get(a)?)?;
            let src = m.munch_exp(c.get(b)?)?;
            let disp = c.get(i)?;
            m.emit(Instr::oper(format!("movq    `s1, {disp}(`s0)"), vec![], vec![base, src]));
            Ok(())
        },
    );
    stm.add(p::mov(p::mem(a), p::konst(j.such_that(IMM32))), move |m, c| {
        let addr = m.munch_exp(c.get(a)?)?;
        let imm = c.get(j)?;
        m.emit(Instr::oper(format!("movq    ${imm}, (`s0)"), vec![], vec![addr]));
        Ok(())
    });
    stm.add(p::mov(p::mem(a), b), move |m, c| {
        let addr = m.munch_exp(c.get(a)?)?;
        let src = m.munch_exp(c.get(b)?)?;
        m.emit(Instr::oper("movq    `s1, (`s0)", vec![], vec![addr, src]));
        Ok(())
    });

    stm.add(p::exp(e), move |m, c| m.munch_discard(c.get(e)?));
}

fn add_value_rules(rules: &mut MuncherRules, v: &mut Vars) {
    let exp = &mut rules.exp;
    let (f, args, func) = (v.label("f"), v.exps("args"), v.exp("func"));
    let (e, a, b, base, index) = (v.exp("e"), v.exp("a"), v.exp("b"), v.exp("base"), v.exp("index"));
    let (i, scale, t, l) = (v.int("i"), v.int("s"), v.temp("t"), v.label("l"));

    exp.add(p::call(p::name(f), args), move |m, c| {
        emit_call(m, c.get(f)?, c.get(args)?)?;
        Ok(m.frame().rv())
    });
    exp.add(p::call(func, args), move |_, c| {
        let call = Exp::call(c.get(func)?.clone(), c.get(args)?.to_vec());
        Err(CodegenError::unsupported("indirect call", call))
    });

    exp.add(p::konst(0i64), move |m, _| {
        let dst = m.new_temp();
        m.emit(Instr::oper("xorq    `d0, `d0", vec![dst], vec![]));
        Ok(dst)
    });
    exp.add(p::konst(i), move |m, c| {
        let dst = m.new_temp();
        let imm = c.get(i)?;
        m.emit(Instr::oper(format!("movq    ${imm}, `d0"), vec![dst], vec![]));
        Ok(dst)
    });
    exp.add(p::name(l), move |m, c| {
        let dst = m.new_temp();
        let label = c.get(l)?;
        m.emit(Instr::oper(format!("leaq    {label}(%rip), `d0"), vec![dst], vec![]));
        Ok(dst)
    });
    exp.add(p::temp(t), move |_, c| c.get(t));

    exp.add(
        p::mem(p::plus(base, p::mul(index, p::konst(scale.such_that(SCALE))))),
        move |m, c| {
            let b = m.munch_exp(c.get(base)?)?;
            let x = m.munch_exp(c.get(index)?)?;
            let s = c.get(scale)?;
            let dst = m.new_temp();
            m.emit(Instr::oper(format!("movq    (`s0,`s1,{s}), `d0"), vec![dst], vec![b, x]));
            Ok(dst)
        },
    );
    exp.add(p::mem(p::plus(e, p::konst(i.such_that(IMM32)))), move |m, c| {
        let addr = m.munch_exp(c.get(e)?)?;
        let disp = c.get(i)?;
        let dst = m.new_temp();
        m.emit(Instr::oper(format!("movq    {disp}(`s0), `d0"), vec![dst], vec![addr]));
        Ok(dst)
    });
    exp.add(p::mem(e), move |m, c| {
        let addr = m.munch_exp(c.get(e)?)?;
        let dst = m.new_temp();
        m.emit(Instr::oper("movq    (`s0), `d0", vec![dst], vec![addr]));
        Ok(dst)
    });

    exp.add(p::plus(e, p::konst(0i64)), move |m, c| m.munch_exp(c.get(e)?));
    exp.add(p::plus(p::konst(0i64), e), move |m, c| m.munch_exp(c.get(e)?));
    exp.add(p::plus(e, p::konst(1i64)), move |m, c| {
        read_modify_write(m, c.get(e)?, "incq    `d0".into())
    });
    exp.add(p::plus(p::konst(1i64), e), move |m, c| {
        read_modify_write(m, c.get(e)?, "incq    `d0".into())
    });
    exp.add(p::plus(e, p::konst(i.such_that(IMM32))), move |m, c| {
        read_modify_write(m, c.get(e)?, format!("addq    ${}, `d0", c.get(i)?))
    });
    exp.add(p::plus(p::konst(i.such_that(IMM32)), e), move |m, c| {
        read_modify_write(m, c.get(e)?, format!("addq    ${}, `d0", c.get(i)?))
    });
    exp.add(p::plus(a, b), move |m, c| two_address(m, "addq", c.get(a)?, c.get(b)?));

    exp.add(p::minus(e, p::konst(1i64)), move |m, c| {
        read_modify_write(m, c.get(e)?, "decq    `d0".into())
    });
    exp.add(p::minus(e, p::konst(i.such_that(IMM32))), move |m, c| {
        read_modify_write(m, c.get(e)?, format!("subq    ${}, `d0", c.get(i)?))
    });
    exp.add(p::minus(a, b), move |m, c| two_address(m, "subq", c.get(a)?, c.get(b)?));

    exp.add(p::mul(e, p::konst(i.such_that(IMM32))), move |m, c| {
        imul_imm(m, c.get(e)?, c.get(i)?)
    });
    exp.add(p::mul(p::konst(i.such_that(IMM32)), e), move |m, c| {
        imul_imm(m, c.get(e)?, c.get(i)?)
    });
    exp.add(p::mul(a, b), move |m, c| two_address(m, "imulq", c.get(a)?, c.get(b)?));

    // idivq divides %rdx:%rax, leaving the quotient in %rax and the remainder in %rdx.
    exp.add(p::binop(BinOp::Div, a, b), move |m, c| {
        let dividend = m.munch_exp(c.get(a)?)?;
        let divisor = m.munch_exp(c.get(b)?)?;
        m.emit(Instr::mov("movq    `s0, `d0", RAX, dividend));
        m.emit(Instr::oper("cqto", vec![RDX], vec![RAX]));
        m.emit(Instr::oper("idivq   `s0", vec![RAX, RDX], vec![divisor, RAX, RDX]));
        let dst = m.new_temp();
        m.emit(Instr::mov("movq    `s0, `d0", dst, RAX));
        Ok(dst)
    });

    for (op, mnemonic) in [(BinOp::And, "andq"), (BinOp::Or, "orq"), (BinOp::Xor, "xorq")] {
        exp.add(p::binop(op, e, p::konst(i.such_that(IMM32))), move |m, c| {
            read_modify_write(m, c.get(e)?, format!("{mnemonic:<8}${}, `d0", c.get(i)?))
        });
        exp.add(p::binop(op, p::konst(i.such_that(IMM32)), e), move |m, c| {
            read_modify_write(m, c.get(e)?, format!("{mnemonic:<8}${}, `d0", c.get(i)?))
        });
        exp.add(p::binop(op, a, b), move |m, c| {
            two_address(m, mnemonic, c.get(a)?, c.get(b)?)
        });
    }
}

fn add_discard_rules(rules: &mut MuncherRules, v: &mut Vars) {
    let discard = &mut rules.discard;
    let (f, args, func, e) = (v.label("f"), v.exps("args"), v.exp("func"), v.exp("e"));

    discard.add(p::call(p::name(f), args), move |m, c| {
        emit_call(m, c.get(f)?, c.get(args)?)
    });
    discard.add(p::call(func, args), move |_, c| {
        let call = Exp::call(c.get(func)?.clone(), c.get(args)?.to_vec());
        Err(CodegenError::unsupported("indirect call", call))
    });
    discard.add(p::konst(Leaf::<IntKind>::Any), |_, _| Ok(()));
    discard.add(p::name(Leaf::<LabelKind>::Any), |_, _| Ok(()));
    discard.add(p::temp(Leaf::<TempKind>::Any), |_, _| Ok(()));
    discard.add(e.into(), move |m, c| m.munch_exp(c.get(e)?).map(drop));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FlowGraph, Liveness};
    use crate::codegen::muncher::munch_body;
    use crate::core::error::RuleCategory;
    use crate::core::session::CompilationSession;
    use crate::ir::IrNode;
    use crate::x64::frame::{CALLER_SAVES, RDI, RSI, RSP};
    use crate::x64::X86_64Frame;
    use bumpalo::Bump;

    fn select(body: &Stm) -> CodegenResult<Vec<Instr>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let frame = X86_64Frame::new(Label::new("f"));
        munch_body(&x86_64_rules(), &frame, &session, body)
    }

    fn render(body: &Stm) -> Vec<String> {
        select(body).unwrap().iter().map(|i| i.to_string()).collect()
    }

    fn t(n: u32) -> Exp {
        Exp::Temp(Temp::Virtual(n))
    }

    #[test]
    fn test_constant_and_lea_moves() {
        let body = Stm::Seq(vec![
            Stm::move_temp(Temp::Virtual(1), Exp::Const(5)),
            Stm::move_temp(Temp::Virtual(2), Exp::plus(t(1), Exp::Const(3))),
        ]);
        assert_eq!(render(&body), vec!["movq    $5, t1", "leaq    3(t1), t2"]);
    }

    #[test]
    fn test_zero_uses_xor() {
        let body = Stm::move_temp(Temp::Virtual(100), Exp::Const(0));
        assert_eq!(render(&body), vec!["xorq    t100, t100"]);
    }

    #[test]
    fn test_compare_with_right_immediate_is_direct() {
        let (yes, no) = (Label::new("Lthen"), Label::new("Lelse"));
        let body = Stm::cjump(RelOp::Lt, t(100), Exp::Const(10), &yes, &no);
        let instrs = select(&body).unwrap();
        assert_eq!(instrs[0].to_string(), "cmpq    $10, t100");
        assert_eq!(instrs[1].to_string(), "jl      Lthen");
        assert_eq!(instrs[1].jumps(), &[yes, no]);
    }

    #[test]
    fn test_compare_with_left_immediate_is_swapped() {
        let (yes, no) = (Label::new("Lthen"), Label::new("Lelse"));
        let body = Stm::cjump(RelOp::Lt, Exp::Const(10), t(100), &yes, &no);
        let instrs = select(&body).unwrap();
        assert_eq!(instrs[0].to_string(), "cmpq    $10, t100");
        assert_eq!(instrs[1].to_string(), "jg      Lthen");
        assert_eq!(instrs[1].jumps(), &[yes, no]);
    }

    #[test]
    fn test_left_memory_is_swapped() {
        let (yes, no) = (Label::new("A"), Label::new("B"));
        let body = Stm::cjump(RelOp::Ule, Exp::mem(t(100)), t(101), &yes, &no);
        assert_eq!(render(&body), vec!["cmpq    (t100), t101", "jae     A"]);
    }

    #[test]
    fn test_wide_constant_is_materialised() {
        let (yes, no) = (Label::new("A"), Label::new("B"));
        let wide = 1i64 << 40;
        let body = Stm::cjump(RelOp::Eq, t(100), Exp::Const(wide), &yes, &no);
        assert_eq!(
            render(&body),
            vec![format!("movq    ${wide}, t0"), "cmpq    t0, t100".into(), "je      A".into()]
        );
    }

    #[test]
    fn test_cmove_computes_value_before_compare() {
        let body = Stm::CMove {
            op: RelOp::Ge,
            left: Exp::Const(3),
            right: t(100),
            dst: Temp::Virtual(101),
            value: Exp::plus(t(102), t(103)),
        };
        let out = render(&body);
        let n = out.len();
        assert_eq!(out[n - 2], "cmpq    $3, t100");
        assert_eq!(out[n - 1], "cmovle  t0, t101");
        assert!(out[..n - 2].iter().any(|s| s.starts_with("addq")));
    }

    #[test]
    fn test_call_stores_arguments_in_reverse() {
        let call = Exp::call(Exp::name("g"), vec![Exp::Const(1), t(100)]);
        let body = Stm::move_temp(Temp::Virtual(101), call);
        let instrs = select(&body).unwrap();
        let text: Vec<String> = instrs.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            text,
            vec!["movq    t100, %rsi", "movq    $1, %rdi", "call    g", "movq    %rax, t101"]
        );

        let call = &instrs[2];
        for reg in CALLER_SAVES {
            assert!(call.def().contains(&reg));
        }
        assert!(call.use_().contains(&RSP));
        assert!(call.use_().contains(&RDI));
        assert!(call.use_().contains(&RSI));
        assert!(!call.use_().contains(&RDX));
    }

    #[test]
    fn test_arguments_evaluated_before_any_store() {
        let div = Exp::binop(BinOp::Div, t(100), t(101));
        let body = Stm::Exp(Exp::call(Exp::name("g"), vec![div, t(102), t(103)]));
        let instrs = select(&body).unwrap();
        let text: Vec<String> = instrs.iter().map(|i| i.to_string()).collect();

        let cqto = text.iter().position(|s| s == "cqto").unwrap();
        let first_store = text.iter().position(|s| s == "movq    t103, %rdx").unwrap();
        assert!(cqto < first_store, "{text:?}");
        assert_eq!(
            text[first_store..],
            ["movq    t103, %rdx", "movq    t102, %rsi", "movq    t0, %rdi", "call    g"]
        );

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let graph = FlowGraph::build(&session, &instrs);
        let live = Liveness::compute(&graph);
        for node in first_store..instrs.len() - 1 {
            assert!(live.live_out(node).contains(&RDX), "%rdx dead after {}", text[node]);
        }
    }

    #[test]
    fn test_nested_call_result_survives_later_arguments() {
        let inner = |f: &str| Exp::call(Exp::name(f), vec![]);
        let body = Stm::Exp(Exp::call(Exp::name("g"), vec![inner("a"), inner("b")]));
        let text = render(&body);

        // Each %rax result is copied out before the other call can clobber it.
        let calls: Vec<usize> = text
            .iter()
            .enumerate()
            .filter(|(_, s)| s.starts_with("call"))
            .map(|(n, _)| n)
            .collect();
        assert_eq!(calls.len(), 3);
        assert!(text[calls[0] + 1].starts_with("movq    %rax, t"));
        assert!(text[calls[1] + 1].starts_with("movq    %rax, t"));
        assert!(text[calls[1] + 2..calls[2]].iter().all(|s| !s.contains("%rax")));
    }

    #[test]
    fn test_seventh_argument_goes_to_stack() {
        let args = (0..7).map(Exp::Const).collect();
        let body = Stm::Exp(Exp::call(Exp::name("h"), args));
        let out = render(&body);
        assert_eq!(out[0], "movq    $6, 0(%rsp)");
        assert_eq!(out.last().unwrap(), "call    h");
    }

    #[test]
    fn test_indirect_transfers_are_unsupported() {
        let jump = Stm::Jump(t(1));
        match select(&jump) {
            Err(CodegenError::Unsupported { what, tree }) => {
                assert_eq!(what, "indirect jump");
                assert_eq!(*tree, IrNode::Stm(jump.clone()));
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }

        let call = Stm::Exp(Exp::call(t(1), vec![]));
        assert!(matches!(
            select(&call),
            Err(CodegenError::Unsupported { what: "indirect call", .. })
        ));
    }

    #[test]
    fn test_scaled_index_guard() {
        let load = |s| Exp::mem(Exp::plus(t(100), Exp::mul(t(101), Exp::Const(s))));
        let scaled = Stm::move_temp(Temp::Virtual(102), load(4));
        assert_eq!(render(&scaled), vec!["movq    (t100,t101,4), t102"]);

        let unscaled = Stm::move_temp(Temp::Virtual(102), load(3));
        let out = render(&unscaled);
        assert!(out.iter().all(|s| !s.contains(",3)")));
        assert!(out.iter().any(|s| s.starts_with("imulq   $3")));
    }

    #[test]
    fn test_division_goes_through_rax_rdx() {
        let body = Stm::move_temp(
            Temp::Virtual(102),
            Exp::binop(BinOp::Div, t(100), t(101)),
        );
        assert_eq!(
            render(&body),
            vec![
                "movq    t100, %rax",
                "cqto",
                "idivq   t101",
                "movq    %rax, t0",
                "movq    t0, t102",
            ]
        );
    }

    #[test]
    fn test_discarded_leaves_emit_nothing() {
        assert!(render(&Stm::Exp(t(1))).is_empty());
        assert!(render(&Stm::Exp(Exp::Const(4))).is_empty());
        assert_eq!(render(&Stm::Exp(Exp::mem(t(1)))), vec!["movq    (t1), t0"]);
    }

    #[test]
    fn test_increment_copies_before_modifying() {
        let body = Stm::Move(Exp::mem(t(100)), Exp::plus(t(101), Exp::Const(1)));
        assert_eq!(
            render(&body),
            vec!["movq    t101, t0", "incq    t0", "movq    t0, (t100)"]
        );
    }

    #[test]
    fn test_every_relop_has_all_compare_shapes() {
        let rules = x86_64_rules();
        let (yes, no) = (Label::new("A"), Label::new("B"));
        for op in RelOp::ALL {
            let shapes = [
                Stm::cjump(op, t(1), Exp::Const(2), &yes, &no),
                Stm::cjump(op, Exp::Const(2), t(1), &yes, &no),
                Stm::cjump(op, Exp::mem(t(1)), Exp::mem(t(2)), &yes, &no),
                Stm::cjump(op, t(1), Exp::mem(t(2)), &yes, &no),
                Stm::cjump(op, Exp::mem(t(1)), t(2), &yes, &no),
                Stm::cjump(op, t(1), t(2), &yes, &no),
            ];
            let selected: Vec<_> = shapes.iter().map(|s| rules.stm.select(s)).collect();
            assert!(selected.iter().all(Option::is_some), "{op}");
            assert!(selected.windows(2).all(|w| w[0] < w[1]), "{op}");
        }
    }

    #[test]
    fn test_rule_dump_shows_guards() {
        let rules = x86_64_rules();
        assert_eq!(rules.stm.category(), RuleCategory::Statement);
        let dump = rules.to_string();
        assert!(dump.contains("MUL(index, CONST(s:1|2|4|8))"));
        assert!(dump.contains("CONST(imm:imm32)"));
    }
}
