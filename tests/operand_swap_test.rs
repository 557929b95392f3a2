//! Compare and branch selection checked against machine semantics.
//!
//! For every relational operator, every operand kind on either side and a grid
//! of boundary values, the selected `cmpq`/`jcc` (or `cmpq`/`cmovcc`) sequence is
//! executed on a tiny flag-level model of x86-64 and the outcome is compared with
//! `RelOp::holds` on the IR operands. A swapped operand order has to be paired with
//! the transposed condition code for this to pass.

use std::collections::HashMap;

use bumpalo::Bump;
use treemunch::codegen::{munch_body, Instr, Target};
use treemunch::core::CompilationSession;
use treemunch::ir::{Exp, Label, RelOp, Stm, Temp};
use treemunch::x64::cond::relop_of_cc;
use treemunch::x64::X86_64Target;

const VALUES: [i64; 10] = [
    i64::MIN,
    -(1 << 31),
    -10,
    -1,
    0,
    1,
    10,
    (1 << 31) - 1,
    1 << 40,
    i64::MAX,
];

#[derive(Debug, Clone, Copy)]
enum Kind {
    Const,
    Reg,
    Mem,
}

const KINDS: [Kind; 3] = [Kind::Const, Kind::Reg, Kind::Mem];

/// Registers, memory and the operands of the last `cmpq`.
#[derive(Default)]
struct Machine {
    regs: HashMap<String, i64>,
    memory: HashMap<i64, i64>,
    compared: Option<(i64, i64)>,
}

impl Machine {
    /// Build an IR operand of `kind` holding `value`. `slot` keeps the two sides apart.
    fn operand(&mut self, kind: Kind, value: i64, slot: u32) -> Exp {
        match kind {
            Kind::Const => Exp::Const(value),
            Kind::Reg => {
                let reg = Temp::Virtual(1000 + slot);
                self.regs.insert(reg.to_string(), value);
                Exp::Temp(reg)
            }
            Kind::Mem => {
                let base = Temp::Virtual(1100 + slot);
                let address = 0x1000 * (i64::from(slot) + 1);
                self.regs.insert(base.to_string(), address);
                self.memory.insert(address, value);
                Exp::mem(Exp::Temp(base))
            }
        }
    }

    fn read(&self, operand: &str) -> i64 {
        if let Some(imm) = operand.strip_prefix('$') {
            return imm.parse().expect("immediate");
        }
        if let Some(inner) = operand.strip_prefix('(').and_then(|o| o.strip_suffix(')')) {
            let address = self.regs[inner];
            return self.memory[&address];
        }
        self.regs[operand]
    }

    /// Evaluate a condition-code suffix from the flags `cmpq b, a` leaves behind.
    fn condition(&self, cc: &str) -> bool {
        let (a, b) = self.compared.expect("flags set by a compare");
        let (result, of) = a.overflowing_sub(b);
        let zf = result == 0;
        let sf = result < 0;
        let cf = (a as u64) < (b as u64);
        match cc {
            "e" => zf,
            "ne" => !zf,
            "l" => sf != of,
            "le" => zf || sf != of,
            "g" => !zf && sf == of,
            "ge" => sf == of,
            "b" => cf,
            "be" => cf || zf,
            "a" => !cf && !zf,
            "ae" => !cf,
            other => panic!("unknown condition code {other}"),
        }
    }

    /// Execute straight-line code; returns the label a branch transferred to, if any.
    fn run(&mut self, code: &[Instr]) -> Option<Label> {
        let mut taken = None;
        for instr in code {
            let text = instr.to_string();
            let (mnemonic, rest) = text.split_once(' ').unwrap_or((text.as_str(), ""));
            let ops: Vec<&str> = rest.trim().split(", ").collect();
            match mnemonic {
                "movq" => {
                    let value = self.read(ops[0]);
                    self.regs.insert(ops[1].to_string(), value);
                }
                // `xorq r, r` is the zero idiom and may name a register never written.
                "xorq" if ops[0] == ops[1] => {
                    self.regs.insert(ops[1].to_string(), 0);
                }
                "xorq" => {
                    let value = self.read(ops[0]) ^ self.read(ops[1]);
                    self.regs.insert(ops[1].to_string(), value);
                }
                "cmpq" => {
                    assert!(!ops[1].starts_with('$'), "immediate in first slot: {text}");
                    assert!(
                        !(ops[0].starts_with('(') && ops[1].starts_with('(')),
                        "two memory operands: {text}"
                    );
                    self.compared = Some((self.read(ops[1]), self.read(ops[0])));
                }
                "jmp" => panic!("unexpected jmp in {text}"),
                m if m.starts_with("cmov") => {
                    if self.condition(&m[4..]) {
                        let value = self.read(ops[0]);
                        self.regs.insert(ops[1].to_string(), value);
                    }
                }
                m if m.starts_with('j') => {
                    if self.condition(&m[1..]) {
                        taken = Some(instr.jumps()[0].clone());
                    }
                }
                other => panic!("instruction outside the compare model: {other}"),
            }
        }
        taken
    }
}

fn select(stm: &Stm) -> Vec<Instr> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let target = X86_64Target::new();
    let frame = target.new_frame(Label::new("f"));
    munch_body(target.rules(), frame.as_ref(), &session, stm).expect("selection succeeds")
}

#[test]
fn test_conditional_jumps_agree_with_relop() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (then_label, else_label) = (Label::new("Lthen"), Label::new("Lelse"));

    for op in RelOp::ALL {
        for lk in KINDS {
            for rk in KINDS {
                for &l in &VALUES {
                    for &r in &VALUES {
                        let mut machine = Machine::default();
                        let left = machine.operand(lk, l, 0);
                        let right = machine.operand(rk, r, 1);
                        let stm = Stm::cjump(op, left, right, &then_label, &else_label);

                        let code = select(&stm);
                        let branch = code.last().expect("a branch");
                        assert_eq!(branch.jumps(), &[then_label.clone(), else_label.clone()]);

                        let taken = machine.run(&code);
                        assert_eq!(
                            taken.is_some(),
                            op.holds(l, r),
                            "{stm} with {lk:?}={l} {rk:?}={r}: {code:?}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_conditional_moves_agree_with_relop() {
    let dst = Temp::Virtual(1200);

    for op in RelOp::ALL {
        for lk in KINDS {
            for rk in KINDS {
                for &l in &VALUES {
                    for &r in &VALUES {
                        let mut machine = Machine::default();
                        machine.regs.insert(dst.to_string(), 0);
                        let left = machine.operand(lk, l, 0);
                        let right = machine.operand(rk, r, 1);
                        let stm = Stm::CMove {
                            op,
                            left,
                            right,
                            dst,
                            value: Exp::Const(1),
                        };

                        let code = select(&stm);
                        assert_eq!(machine.run(&code), None);
                        assert_eq!(
                            machine.regs[&dst.to_string()] == 1,
                            op.holds(l, r),
                            "{stm} with {lk:?}={l} {rk:?}={r}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_swap_keeps_targets_and_transposes_condition() {
    let x = Temp::Virtual(1000);
    let (then_label, else_label) = (Label::new("T"), Label::new("F"));

    for op in RelOp::ALL {
        let direct = select(&Stm::cjump(op, Exp::Temp(x), Exp::Const(7), &then_label, &else_label));
        let swapped = select(&Stm::cjump(op, Exp::Const(7), Exp::Temp(x), &then_label, &else_label));

        // Both orders produce `cmpq $7, x`; only the condition differs.
        assert_eq!(direct[0].to_string(), swapped[0].to_string());
        assert_eq!(direct[1].jumps(), swapped[1].jumps());
        let tested = |code: &[Instr]| relop_of_cc(&code[1].mnemonic()[1..]);
        assert_eq!(tested(&direct), Some(op));
        assert_eq!(tested(&swapped), Some(op.swapped()));
    }
}
