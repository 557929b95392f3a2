// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession is the hub shared by every phase of one compilation: it owns a reference
// to the arena that holds flow-graph edge lists, hands out fresh virtual temporaries so that
// temporaries created by the translator and by rule actions never collide, remembers which
// procedure is being compiled for diagnostics, and accumulates SessionStats. Statistics count
// procedures and data fragments compiled, instructions emitted (with a per-mnemonic breakdown),
// rule firings per rule category and liveness propagations. Interior mutability (Cell/RefCell)
// lets the muncher, the flow-graph builder and the liveness engine share one &session.

//! Arena-based compilation session management.
//!
//! All per-session objects borrow the arena, so flow graphs and their edge
//! slices live exactly as long as the session that built them.

use crate::core::error::RuleCategory;
use crate::ir::Temp;
use bumpalo::Bump;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for flow-graph data.
    arena: &'arena Bump,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,

    /// Next virtual temporary number.
    next_temp: Cell<u32>,

    /// Procedure currently being compiled.
    current_procedure: RefCell<Option<String>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            next_temp: Cell::new(0),
            current_procedure: RefCell::new(None),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Fresh virtual register, unique within this session.
    pub fn new_temp(&self) -> Temp {
        let n = self.next_temp.get();
        self.next_temp.set(n + 1);
        Temp::Virtual(n)
    }

    /// Number of temporaries handed out so far.
    pub fn temp_count(&self) -> u32 {
        self.next_temp.get()
    }

    pub fn set_current_procedure(&self, name: &str) {
        *self.current_procedure.borrow_mut() = Some(name.to_string());
    }

    pub fn current_procedure(&self) -> Option<String> {
        self.current_procedure.borrow().clone()
    }

    pub fn clear_procedure_state(&self) {
        *self.current_procedure.borrow_mut() = None;
    }

    /// Record that a procedure was compiled into `instructions` instructions.
    pub fn record_procedure_compiled(&self, name: &str, instructions: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.procedures_compiled += 1;

        if stats.largest_procedure_size < instructions {
            stats.largest_procedure_size = instructions;
            stats.largest_procedure_name = name.to_string();
        }
    }

    pub fn record_data_compiled(&self) {
        self.stats.borrow_mut().data_fragments_compiled += 1;
    }

    /// Record one emitted instruction under its mnemonic.
    pub fn record_instruction_emitted(&self, mnemonic: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_emitted += 1;
        *stats
            .instruction_counts
            .entry(mnemonic.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_rule_fired(&self, category: RuleCategory) {
        let mut stats = self.stats.borrow_mut();
        match category {
            RuleCategory::Statement => stats.statement_rules_fired += 1,
            RuleCategory::Value => stats.value_rules_fired += 1,
            RuleCategory::Discard => stats.discard_rules_fired += 1,
        }
    }

    pub fn record_propagations(&self, fired: usize) {
        self.stats.borrow_mut().liveness_propagations += fired;
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub procedures_compiled: usize,
    pub data_fragments_compiled: usize,

    /// Instructions emitted across all fragments.
    pub instructions_emitted: usize,

    /// Count of each mnemonic emitted.
    pub instruction_counts: HashMap<String, usize>,

    pub largest_procedure_size: usize,
    pub largest_procedure_name: String,

    pub statement_rules_fired: usize,
    pub value_rules_fired: usize,
    pub discard_rules_fired: usize,

    /// Listener firings in the liveness networks.
    pub liveness_propagations: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Procedures compiled: {}", self.procedures_compiled)?;
        writeln!(f, "  Data fragments compiled: {}", self.data_fragments_compiled)?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;
        writeln!(
            f,
            "  Rules fired: {} statement, {} value, {} discard",
            self.statement_rules_fired, self.value_rules_fired, self.discard_rules_fired
        )?;
        writeln!(f, "  Liveness propagations: {}", self.liveness_propagations)?;

        if !self.largest_procedure_name.is_empty() {
            writeln!(
                f,
                "  Largest procedure: {} ({} instructions)",
                self.largest_procedure_name, self.largest_procedure_size
            )?;
        }

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|(a, x), (b, y)| y.cmp(x).then(a.cmp(b)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}
