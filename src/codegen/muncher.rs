// This module implements the rule tables and the dispatch loop of instruction selection. A
// RuleTable is an ordered list of (pattern, action) rules for one syntactic category; the
// MuncherRules bundle holds the three tables a target supplies (statements, value-producing
// expressions, expressions evaluated only for their side effects). The bundle is built once,
// never mutated, and lent to every Muncher. For each node the Muncher tries rules in
// registration order and commits to the first one whose pattern matches; the action may call
// back into the Muncher to munch subtrees, so instructions are emitted children-first in exactly
// the order actions call emit(). When no rule matches, munching fails with NoApplicableRule
// carrying the offending subtree. Statement sequences are flattened here and never reach a table.

//! Rule tables and the munching driver.

use super::instr::Instr;
use super::patterns::{ExpPat, Matched, Pattern, StmPat};
use crate::core::error::{CodegenError, CodegenResult, RuleCategory};
use crate::core::session::CompilationSession;
use crate::ir::{Exp, Frame, IrNode, Stm, Temp};
use std::fmt;

/// Action run when a rule's pattern matches.
pub type Action<R> = Box<dyn Fn(&mut Muncher<'_, '_>, &Matched<'_>) -> CodegenResult<R>>;

pub struct MunchRule<P, R> {
    pattern: P,
    action: Action<R>,
}

impl<P: Pattern, R> MunchRule<P, R> {
    pub fn pattern(&self) -> &P {
        &self.pattern
    }
}

/// Priority-ordered rules of one category. Earlier rules win.
pub struct RuleTable<P, R> {
    category: RuleCategory,
    rules: Vec<MunchRule<P, R>>,
}

impl<P, R> RuleTable<P, R>
where
    P: Pattern,
    P::Node: Clone + Into<IrNode> + fmt::Display,
{
    pub fn new(category: RuleCategory) -> Self {
        Self {
            category,
            rules: Vec::new(),
        }
    }

    /// Append a rule with the lowest priority so far.
    pub fn add<F>(&mut self, pattern: P, action: F)
    where
        F: Fn(&mut Muncher<'_, '_>, &Matched<'_>) -> CodegenResult<R> + 'static,
    {
        self.rules.push(MunchRule {
            pattern,
            action: Box::new(action),
        });
    }

    pub fn category(&self) -> RuleCategory {
        self.category
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[MunchRule<P, R>] {
        &self.rules
    }

    /// Index of the rule that would fire for `node`.
    pub fn select(&self, node: &P::Node) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| rule.pattern.matches(node).is_some())
    }

    fn dispatch(&self, muncher: &mut Muncher<'_, '_>, node: &P::Node) -> CodegenResult<R> {
        for (idx, rule) in self.rules.iter().enumerate() {
            let Some(captures) = rule.pattern.matches(node) else {
                continue;
            };
            log::trace!("{} rule #{idx} {} fires on {node}", self.category, rule.pattern);
            muncher.session.record_rule_fired(self.category);
            return (rule.action)(muncher, &captures);
        }
        Err(CodegenError::no_rule(self.category, node.clone()))
    }
}

impl<P: Pattern, R> fmt::Display for RuleTable<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} rules:", self.category)?;
        for (idx, rule) in self.rules.iter().enumerate() {
            writeln!(f, "  {idx:3}: {}", rule.pattern)?;
        }
        Ok(())
    }
}

/// The three rule tables of one target.
pub struct MuncherRules {
    pub stm: RuleTable<StmPat, ()>,
    pub exp: RuleTable<ExpPat, Temp>,
    pub discard: RuleTable<ExpPat, ()>,
}

impl MuncherRules {
    pub fn new() -> Self {
        Self {
            stm: RuleTable::new(RuleCategory::Statement),
            exp: RuleTable::new(RuleCategory::Value),
            discard: RuleTable::new(RuleCategory::Discard),
        }
    }
}

impl Default for MuncherRules {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MuncherRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.stm, self.exp, self.discard)
    }
}

/// Munching state for one procedure.
pub struct Muncher<'a, 'arena> {
    rules: &'a MuncherRules,
    frame: &'a dyn Frame,
    session: &'a CompilationSession<'arena>,
    instrs: Vec<Instr>,
}

impl<'a, 'arena> Muncher<'a, 'arena> {
    pub fn new(
        rules: &'a MuncherRules,
        frame: &'a dyn Frame,
        session: &'a CompilationSession<'arena>,
    ) -> Self {
        Self {
            rules,
            frame,
            session,
            instrs: Vec::new(),
        }
    }

    pub fn frame(&self) -> &'a dyn Frame {
        self.frame
    }

    pub fn session(&self) -> &'a CompilationSession<'arena> {
        self.session
    }

    pub fn new_temp(&self) -> Temp {
        self.session.new_temp()
    }

    /// Append `instr` to the procedure's instruction list.
    pub fn emit(&mut self, instr: Instr) {
        log::trace!("emit {instr}");
        self.session.record_instruction_emitted(instr.mnemonic());
        self.instrs.push(instr);
    }

    pub fn munch_stm(&mut self, stm: &Stm) -> CodegenResult<()> {
        if let Stm::Seq(stms) = stm {
            for s in stms {
                self.munch_stm(s)?;
            }
            return Ok(());
        }
        let rules = self.rules;
        rules.stm.dispatch(self, stm)
    }

    /// Munch `exp` and return the register holding its value.
    pub fn munch_exp(&mut self, exp: &Exp) -> CodegenResult<Temp> {
        let rules = self.rules;
        rules.exp.dispatch(self, exp)
    }

    /// Munch `exp` for its side effects only.
    pub fn munch_discard(&mut self, exp: &Exp) -> CodegenResult<()> {
        let rules = self.rules;
        rules.discard.dispatch(self, exp)
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn finish(self) -> Vec<Instr> {
        self.instrs
    }
}

/// Munch a whole procedure body. On error nothing is returned.
pub fn munch_body(
    rules: &MuncherRules,
    frame: &dyn Frame,
    session: &CompilationSession<'_>,
    body: &Stm,
) -> CodegenResult<Vec<Instr>> {
    let mut muncher = Muncher::new(rules, frame, session);
    muncher.munch_stm(body)?;
    Ok(muncher.finish())
}
