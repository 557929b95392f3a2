// This module reads canonical IR from a small s-expression syntax so that fragments can be fed
// to the code generator from files and written compactly in tests. A file is a list of
// fragments:
//
//   (proc main
//     (move (temp i) (const 0))
//     (label loop)
//     (cjump lt (temp i) (const 10) body done)
//     (label body)
//     (move (temp i) (plus (temp i) (const 1)))
//     (jump loop)
//     (label done))
//   (data table (const 1) (name main))
//
// Statements are label, jump, cjump, cmove, move, exp and seq; expressions are const, name,
// temp, mem, call and the lower-case binary operator names. A jump whose target is an atom jumps
// to that label; a list target is an arbitrary expression. Temporaries are named: each new name
// gets a fresh session temporary and keeps it for the life of the reader, while names starting
// with `%` denote the target's machine registers. Comments run from `;` to the end of the line.
// Every error carries the line of the offending form.

//! S-expression reader for IR fragments.

use super::{BinOp, DataFragment, Exp, Fragment, Label, ProcFragment, RelOp, Stm, Temp};
use crate::codegen::Target;
use crate::core::error::{CodegenError, CodegenResult};
use crate::core::session::CompilationSession;
use hashbrown::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Sexp<'s> {
    Atom(&'s str, usize),
    List(Vec<Sexp<'s>>, usize),
}

impl Sexp<'_> {
    fn line(&self) -> usize {
        match self {
            Sexp::Atom(_, line) | Sexp::List(_, line) => *line,
        }
    }
}

fn error(line: usize, message: impl Into<String>) -> CodegenError {
    CodegenError::Parse {
        line,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> CodegenResult<Vec<Sexp<'_>>> {
    let mut stack: Vec<(Vec<Sexp<'_>>, usize)> = vec![(Vec::new(), 1)];
    let mut line = 1;
    let mut chars = source.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '\n' => line += 1,
            ';' => while chars.next_if(|(_, c)| *c != '\n').is_some() {},
            '(' => stack.push((Vec::new(), line)),
            ')' => {
                if stack.len() < 2 {
                    return Err(error(line, "unexpected `)`"));
                }
                let (items, start) = stack.pop().ok_or_else(|| error(line, "unexpected `)`"))?;
                let parent = stack.last_mut().ok_or_else(|| error(line, "unexpected `)`"))?;
                parent.0.push(Sexp::List(items, start));
            }
            c if c.is_whitespace() => {}
            _ => {
                let mut end = pos + ch.len_utf8();
                while let Some((p, c)) =
                    chars.next_if(|(_, c)| !c.is_whitespace() && !matches!(c, '(' | ')' | ';'))
                {
                    end = p + c.len_utf8();
                }
                if let Some(top) = stack.last_mut() {
                    top.0.push(Sexp::Atom(&source[pos..end], line));
                }
            }
        }
    }

    match stack.pop() {
        Some((items, _)) if stack.is_empty() => Ok(items),
        Some((_, start)) => Err(error(start, "unclosed `(`")),
        None => Ok(Vec::new()),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as i64);
    }
    if let Some(hex) = text.strip_prefix("-0x") {
        return u64::from_str_radix(hex, 16).ok().map(|v| (v as i64).wrapping_neg());
    }
    text.parse().ok()
}

/// Split `(keyword args...)` into its parts.
fn form<'b, 's>(sexp: &'b Sexp<'s>) -> CodegenResult<(&'s str, &'b [Sexp<'s>], usize)> {
    match sexp {
        Sexp::List(items, line) => match items.split_first() {
            Some((Sexp::Atom(keyword, _), args)) => Ok((*keyword, args, *line)),
            _ => Err(error(*line, "expected `(keyword ...)`")),
        },
        Sexp::Atom(text, line) => Err(error(*line, format!("expected a form, found `{text}`"))),
    }
}

fn arity(keyword: &str, args: &[Sexp<'_>], expected: usize, line: usize) -> CodegenResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(error(
            line,
            format!("`{keyword}` takes {expected} operands, found {}", args.len()),
        ))
    }
}

fn atom<'s>(sexp: &Sexp<'s>, what: &str) -> CodegenResult<&'s str> {
    match sexp {
        Sexp::Atom(text, _) => Ok(*text),
        Sexp::List(_, line) => Err(error(*line, format!("expected {what}"))),
    }
}

fn label(sexp: &Sexp<'_>) -> CodegenResult<Label> {
    atom(sexp, "a label").map(Label::new)
}

fn relop(sexp: &Sexp<'_>) -> CodegenResult<RelOp> {
    let name = atom(sexp, "a relational operator")?;
    RelOp::ALL
        .into_iter()
        .find(|op| op.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| error(sexp.line(), format!("unknown relational operator `{name}`")))
}

/// Reads IR fragments, naming temporaries through one session.
pub struct IrReader<'a, 'arena> {
    target: &'a dyn Target,
    session: &'a CompilationSession<'arena>,
    temps: HashMap<String, Temp>,
}

impl<'a, 'arena> IrReader<'a, 'arena> {
    pub fn new(target: &'a dyn Target, session: &'a CompilationSession<'arena>) -> Self {
        Self {
            target,
            session,
            temps: HashMap::new(),
        }
    }

    /// Temporary assigned to `name`, if the reader has seen it.
    pub fn temp(&self, name: &str) -> Option<Temp> {
        self.temps.get(name).copied()
    }

    pub fn read_fragments(&mut self, source: &str) -> CodegenResult<Vec<Fragment>> {
        tokenize(source)?.iter().map(|sexp| self.fragment(sexp)).collect()
    }

    /// Read statements; more than one is wrapped in a `SEQ`.
    pub fn read_stm(&mut self, source: &str) -> CodegenResult<Stm> {
        let mut stms = tokenize(source)?
            .iter()
            .map(|sexp| self.stm(sexp))
            .collect::<CodegenResult<Vec<_>>>()?;
        match stms.len() {
            0 => Err(error(1, "no statement")),
            1 => Ok(stms.remove(0)),
            _ => Ok(Stm::Seq(stms)),
        }
    }

    pub fn read_exp(&mut self, source: &str) -> CodegenResult<Exp> {
        match tokenize(source)?.as_slice() {
            [sexp] => self.exp(sexp),
            _ => Err(error(1, "expected exactly one expression")),
        }
    }

    fn fragment(&mut self, sexp: &Sexp<'_>) -> CodegenResult<Fragment> {
        let (keyword, args, line) = form(sexp)?;
        let Some((name, rest)) = args.split_first() else {
            return Err(error(line, format!("`{keyword}` needs a name")));
        };
        let name = label(name)?;
        match keyword {
            "proc" => {
                let body = rest
                    .iter()
                    .map(|s| self.stm(s))
                    .collect::<CodegenResult<Vec<_>>>()?;
                Ok(Fragment::Proc(ProcFragment {
                    frame: self.target.new_frame(name),
                    body: Stm::Seq(body),
                }))
            }
            "data" => {
                let words = rest
                    .iter()
                    .map(|s| self.exp(s))
                    .collect::<CodegenResult<Vec<_>>>()?;
                Ok(Fragment::Data(DataFragment { label: name, words }))
            }
            other => Err(error(line, format!("unknown fragment `{other}`"))),
        }
    }

    fn stm(&mut self, sexp: &Sexp<'_>) -> CodegenResult<Stm> {
        let (keyword, args, line) = form(sexp)?;
        match keyword {
            "label" => {
                arity(keyword, args, 1, line)?;
                Ok(Stm::Label(label(&args[0])?))
            }
            "jump" => {
                arity(keyword, args, 1, line)?;
                match &args[0] {
                    Sexp::Atom(target, _) => Ok(Stm::jump_to(&Label::new(target))),
                    target => Ok(Stm::Jump(self.exp(target)?)),
                }
            }
            "cjump" => {
                arity(keyword, args, 5, line)?;
                Ok(Stm::CJump {
                    op: relop(&args[0])?,
                    left: self.exp(&args[1])?,
                    right: self.exp(&args[2])?,
                    then_label: label(&args[3])?,
                    else_label: label(&args[4])?,
                })
            }
            "cmove" => {
                arity(keyword, args, 5, line)?;
                Ok(Stm::CMove {
                    op: relop(&args[0])?,
                    left: self.exp(&args[1])?,
                    right: self.exp(&args[2])?,
                    dst: self.temp_operand(&args[3])?,
                    value: self.exp(&args[4])?,
                })
            }
            "move" => {
                arity(keyword, args, 2, line)?;
                Ok(Stm::Move(self.exp(&args[0])?, self.exp(&args[1])?))
            }
            "exp" => {
                arity(keyword, args, 1, line)?;
                Ok(Stm::Exp(self.exp(&args[0])?))
            }
            "seq" => Ok(Stm::Seq(
                args.iter().map(|s| self.stm(s)).collect::<CodegenResult<_>>()?,
            )),
            other => Err(error(line, format!("unknown statement `{other}`"))),
        }
    }

    fn exp(&mut self, sexp: &Sexp<'_>) -> CodegenResult<Exp> {
        if let Sexp::Atom(text, line) = sexp {
            return parse_int(text)
                .map(Exp::Const)
                .ok_or_else(|| error(*line, format!("expected an expression, found `{text}`")));
        }

        let (keyword, args, line) = form(sexp)?;
        match keyword {
            "const" => {
                arity(keyword, args, 1, line)?;
                let text = atom(&args[0], "an integer")?;
                parse_int(text)
                    .map(Exp::Const)
                    .ok_or_else(|| error(line, format!("bad integer `{text}`")))
            }
            "name" => {
                arity(keyword, args, 1, line)?;
                Ok(Exp::Name(label(&args[0])?))
            }
            "temp" => {
                arity(keyword, args, 1, line)?;
                Ok(Exp::Temp(self.temp_operand(&args[0])?))
            }
            "mem" => {
                arity(keyword, args, 1, line)?;
                Ok(Exp::mem(self.exp(&args[0])?))
            }
            "call" => {
                let Some((func, rest)) = args.split_first() else {
                    return Err(error(line, "`call` needs a function"));
                };
                let func = match func {
                    Sexp::Atom(name, _) => Exp::Name(Label::new(name)),
                    other => self.exp(other)?,
                };
                let args = rest
                    .iter()
                    .map(|s| self.exp(s))
                    .collect::<CodegenResult<Vec<_>>>()?;
                Ok(Exp::call(func, args))
            }
            other => {
                let op = BinOp::ALL
                    .into_iter()
                    .find(|op| op.name().eq_ignore_ascii_case(other))
                    .ok_or_else(|| error(line, format!("unknown expression `{other}`")))?;
                arity(keyword, args, 2, line)?;
                Ok(Exp::binop(op, self.exp(&args[0])?, self.exp(&args[1])?))
            }
        }
    }

    /// A temporary named by an atom or a `(temp name)` form.
    fn temp_operand(&mut self, sexp: &Sexp<'_>) -> CodegenResult<Temp> {
        let name = match sexp {
            Sexp::Atom(name, _) => *name,
            list => {
                let (keyword, args, line) = form(list)?;
                if keyword != "temp" {
                    return Err(error(line, "expected a temporary"));
                }
                arity(keyword, args, 1, line)?;
                atom(&args[0], "a temporary name")?
            }
        };

        if name.starts_with('%') {
            return self
                .target
                .register(name)
                .ok_or_else(|| error(sexp.line(), format!("unknown register `{name}`")));
        }
        let session = self.session;
        Ok(*self
            .temps
            .entry(name.to_string())
            .or_insert_with(|| session.new_temp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::{frame, X86_64Target};
    use bumpalo::Bump;

    #[test]
    fn test_read_procedure_and_data() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let target = X86_64Target::new();
        let mut reader = IrReader::new(&target, &session);

        let fragments = reader
            .read_fragments(
                "; two fragments\n\
                 (proc main (move (temp a) (const 5)) (exp (call print (temp a))))\n\
                 (data table 1 (const -2) (name main))",
            )
            .unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].name().name(), "main");

        let a = reader.temp("a").unwrap();
        match &fragments[0] {
            Fragment::Proc(proc) => assert_eq!(
                proc.body,
                Stm::Seq(vec![
                    Stm::move_temp(a, Exp::Const(5)),
                    Stm::Exp(Exp::call(Exp::name("print"), vec![Exp::Temp(a)])),
                ])
            ),
            Fragment::Data(_) => panic!("expected a procedure"),
        }
        match &fragments[1] {
            Fragment::Data(data) => assert_eq!(
                data.words,
                vec![Exp::Const(1), Exp::Const(-2), Exp::name("main")]
            ),
            Fragment::Proc(_) => panic!("expected data"),
        }
    }

    #[test]
    fn test_names_map_to_stable_temps() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let target = X86_64Target::new();
        let mut reader = IrReader::new(&target, &session);

        let stm = reader
            .read_stm("(move (temp x) (plus (temp y) (temp x))) (cmove ge (temp x) 0x10 y (temp %rdi))")
            .unwrap();
        let (x, y) = (reader.temp("x").unwrap(), reader.temp("y").unwrap());
        assert_ne!(x, y);
        assert!(!x.is_fixed() && frame::RDI.is_fixed());
        assert_eq!(
            stm,
            Stm::Seq(vec![
                Stm::move_temp(x, Exp::plus(Exp::Temp(y), Exp::Temp(x))),
                Stm::CMove {
                    op: RelOp::Ge,
                    left: Exp::Temp(x),
                    right: Exp::Const(16),
                    dst: y,
                    value: Exp::Temp(frame::RDI),
                },
            ])
        );
    }

    #[test]
    fn test_jump_forms() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let target = X86_64Target::new();
        let mut reader = IrReader::new(&target, &session);

        assert_eq!(reader.read_stm("(jump L)").unwrap(), Stm::jump_to(&Label::new("L")));
        let indirect = reader.read_stm("(jump (temp t))").unwrap();
        assert!(matches!(indirect, Stm::Jump(Exp::Temp(_))));
        let cj = reader.read_stm("(cjump ULT (const 1) (mem (temp t)) A B)").unwrap();
        assert!(matches!(cj, Stm::CJump { op: RelOp::Ult, .. }));
        assert_eq!(
            reader.read_exp("(div 7 (xor 1 2))").unwrap(),
            Exp::binop(
                BinOp::Div,
                Exp::Const(7),
                Exp::binop(BinOp::Xor, Exp::Const(1), Exp::Const(2))
            )
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let target = X86_64Target::new();
        let mut reader = IrReader::new(&target, &session);

        let err = reader.read_fragments("(proc f\n  (move (temp a))\n)").unwrap_err();
        assert!(matches!(err, CodegenError::Parse { line: 2, .. }), "{err}");

        let err = reader.read_stm("(move (temp %xmm0) 1)").unwrap_err();
        assert_eq!(err.to_string(), "line 1: unknown register `%xmm0`");

        let err = reader.read_stm("\n\n(label L").unwrap_err();
        assert!(matches!(err, CodegenError::Parse { line: 3, .. }));

        let err = reader.read_stm("(exp 1))").unwrap_err();
        assert_eq!(err.to_string(), "line 1: unexpected `)`");

        let err = reader.read_stm("(frob 1)").unwrap_err();
        assert_eq!(err.to_string(), "line 1: unknown statement `frob`");
    }
}
