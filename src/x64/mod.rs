// This module ties the x86-64 pieces into one Target: the System V frame, the condition-code
// tables and the munching rules. The rule tables are built once when the target is created and
// shared by reference with every CodeGenerator that uses it.

//! x86-64 target: System V frames, condition codes and the rule tables.
//!
//! Instructions are rendered in AT&T syntax with 64-bit (`q`) operand size.

pub mod cond;
pub mod frame;
pub mod rules;

pub use frame::X86_64Frame;
pub use rules::x86_64_rules;

use crate::codegen::{Instr, MuncherRules, Target};
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{Exp, Frame, Label, Temp};

/// The x86-64 code generation target. Builds its rule tables once.
pub struct X86_64Target {
    rules: MuncherRules,
}

impl X86_64Target {
    pub fn new() -> Self {
        Self {
            rules: x86_64_rules(),
        }
    }
}

impl Default for X86_64Target {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for X86_64Target {
    fn name(&self) -> &'static str {
        "x86-64"
    }

    fn rules(&self) -> &MuncherRules {
        &self.rules
    }

    fn new_frame(&self, name: Label) -> Box<dyn Frame> {
        Box::new(X86_64Frame::new(name))
    }

    fn register(&self, name: &str) -> Option<Temp> {
        frame::register(name)
    }

    fn data_word(&self, word: &Exp) -> CodegenResult<Instr> {
        match word {
            Exp::Const(value) => Ok(Instr::oper(format!(".quad   {value}"), vec![], vec![])),
            Exp::Name(label) => Ok(Instr::oper(format!(".quad   {label}"), vec![], vec![])),
            other => Err(CodegenError::unsupported("data initializer", other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_words() {
        let target = X86_64Target::new();
        let word = target.data_word(&Exp::Const(-3)).unwrap();
        assert_eq!(word.to_string(), ".quad   -3");
        assert!(word.def().is_empty() && word.use_().is_empty());

        let word = target.data_word(&Exp::name("table")).unwrap();
        assert_eq!(word.to_string(), ".quad   table");

        let err = target.data_word(&Exp::plus(Exp::Const(1), Exp::Const(2)));
        assert!(matches!(
            err,
            Err(CodegenError::Unsupported { what: "data initializer", .. })
        ));
    }

    #[test]
    fn test_frames_carry_their_name() {
        let target = X86_64Target::new();
        let frame = target.new_frame(Label::new("main"));
        assert_eq!(frame.name().name(), "main");
        assert_eq!(frame.word_size(), 8);
    }
}
