// This module defines the error types of the code generator using the thiserror crate.
// CodegenError separates the two fatal instruction-selection failures: a rule table that has
// no rule for some IR shape (NoApplicableRule, carrying the unmatched subtree) and a shape the
// target deliberately refuses (Unsupported, e.g. indirect calls and jumps). UnboundCapture
// flags a rule action that asks for a capture its pattern never binds. Parse errors come from
// the textual IR reader and Io errors from the command-line tool. Local pattern-match failure
// is not an error at all; it is an Option at the matcher boundary.

//! Error types for the code generator.

use crate::ir::IrNode;
use thiserror::Error;

/// Which rule table was consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    Statement,
    Value,
    Discard,
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RuleCategory::Statement => "statement",
            RuleCategory::Value => "value expression",
            RuleCategory::Discard => "discarded expression",
        })
    }
}

/// Main error type for code generation.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("no {category} rule matches {tree}")]
    NoApplicableRule {
        category: RuleCategory,
        tree: Box<IrNode>,
    },

    #[error("not implemented: {what} in {tree}")]
    Unsupported {
        what: &'static str,
        tree: Box<IrNode>,
    },

    #[error("rule action read capture `{name}` that its pattern never binds")]
    UnboundCapture { name: &'static str },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodegenError {
    pub fn unsupported(what: &'static str, tree: impl Into<IrNode>) -> Self {
        CodegenError::Unsupported {
            what,
            tree: Box::new(tree.into()),
        }
    }

    pub fn no_rule(category: RuleCategory, tree: impl Into<IrNode>) -> Self {
        CodegenError::NoApplicableRule {
            category,
            tree: Box::new(tree.into()),
        }
    }

    /// Whether this is an internal-compiler-error rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CodegenError::NoApplicableRule { .. }
                | CodegenError::Unsupported { .. }
                | CodegenError::UnboundCapture { .. }
        )
    }
}

/// Result type alias for code generation.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Exp, Temp};

    #[test]
    fn test_no_rule_carries_subtree() {
        let err = CodegenError::no_rule(RuleCategory::Value, Exp::mem(Exp::Temp(Temp::Virtual(4))));
        assert_eq!(err.to_string(), "no value expression rule matches MEM(TEMP(t4))");
        assert!(err.is_internal());
    }

    #[test]
    fn test_unsupported_is_distinct() {
        let err = CodegenError::unsupported("indirect call", Exp::Temp(Temp::Virtual(1)));
        assert!(matches!(err, CodegenError::Unsupported { .. }));
        assert_eq!(err.to_string(), "not implemented: indirect call in TEMP(t1)");
    }
}
