// This module builds the instruction-level control-flow graph that liveness runs on. Nodes are
// 1:1 with the selected instructions and keyed by their index, which stays stable for the life
// of the graph. A node's successors are the next instruction when control can fall through,
// plus the node of every label the instruction may jump to; jump targets are resolved through a
// label map built in a first pass. Targets that do not name a label inside the procedure (a
// tail call into another function, for instance) are skipped with a warning. Successor and
// predecessor lists are stored flat in the session arena: one offsets array of n+1 entries and
// one targets array per direction, so a node's list is a subslice.

//! Control-flow graph over selected instructions.

use crate::codegen::Instr;
use crate::core::session::CompilationSession;
use crate::ir::{Label, Temp};
use bumpalo::collections::Vec as BumpVec;
use hashbrown::HashMap;

/// Stable key of a flow-graph node: the index of its instruction.
pub type NodeId = usize;

pub struct FlowGraph<'a> {
    instrs: &'a [Instr],
    succ_offsets: &'a [usize],
    succ_targets: &'a [NodeId],
    pred_offsets: &'a [usize],
    pred_targets: &'a [NodeId],
}

impl<'a> FlowGraph<'a> {
    /// Build the graph of `instrs`, allocating the edge lists in the session arena.
    pub fn build(session: &CompilationSession<'a>, instrs: &'a [Instr]) -> Self {
        let arena = session.arena();
        let n = instrs.len();

        let mut labels: HashMap<&Label, NodeId> = HashMap::with_capacity(n / 4 + 1);
        for (id, instr) in instrs.iter().enumerate() {
            if let Some(label) = instr.label_name() {
                labels.insert(label, id);
            }
        }

        let mut succ_offsets = BumpVec::with_capacity_in(n + 1, arena);
        let mut succ_targets = BumpVec::with_capacity_in(n + n / 2, arena);
        let mut pred_count = vec![0usize; n];

        for (id, instr) in instrs.iter().enumerate() {
            succ_offsets.push(succ_targets.len());
            let start = succ_targets.len();

            if instr.falls_through() && id + 1 < n {
                succ_targets.push(id + 1);
            }
            for target in instr.jumps() {
                match labels.get(target) {
                    Some(&to) => {
                        if !succ_targets[start..].contains(&to) {
                            succ_targets.push(to);
                        }
                    }
                    None => log::warn!("jump target {target} of `{instr}` is not a label here"),
                }
            }
            for &to in &succ_targets[start..] {
                pred_count[to] += 1;
            }
        }
        succ_offsets.push(succ_targets.len());

        // Predecessors: prefix sums of the counts, then a fill pass.
        let mut pred_offsets = BumpVec::with_capacity_in(n + 1, arena);
        let mut total = 0;
        for count in &pred_count {
            pred_offsets.push(total);
            total += count;
        }
        pred_offsets.push(total);

        let mut pred_targets = BumpVec::from_iter_in(std::iter::repeat(0).take(total), arena);
        let mut cursor: Vec<usize> = pred_offsets[..n].to_vec();
        for from in 0..n {
            for &to in &succ_targets[succ_offsets[from]..succ_offsets[from + 1]] {
                pred_targets[cursor[to]] = from;
                cursor[to] += 1;
            }
        }

        let graph = Self {
            instrs,
            succ_offsets: succ_offsets.into_bump_slice(),
            succ_targets: succ_targets.into_bump_slice(),
            pred_offsets: pred_offsets.into_bump_slice(),
            pred_targets: pred_targets.into_bump_slice(),
        };
        log::debug!("flow graph: {} nodes, {} edges", graph.len(), graph.edge_count());
        graph
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn nodes(&self) -> std::ops::Range<NodeId> {
        0..self.instrs.len()
    }

    pub fn instr(&self, node: NodeId) -> &'a Instr {
        &self.instrs[node]
    }

    pub fn succ(&self, node: NodeId) -> &'a [NodeId] {
        &self.succ_targets[self.succ_offsets[node]..self.succ_offsets[node + 1]]
    }

    pub fn pred(&self, node: NodeId) -> &'a [NodeId] {
        &self.pred_targets[self.pred_offsets[node]..self.pred_offsets[node + 1]]
    }

    pub fn def(&self, node: NodeId) -> &'a [Temp] {
        self.instrs[node].def()
    }

    pub fn use_(&self, node: NodeId) -> &'a [Temp] {
        self.instrs[node].use_()
    }

    /// Whether the node is a register-to-register move, a coalescing candidate.
    pub fn is_move(&self, node: NodeId) -> bool {
        self.instrs[node].is_move()
    }

    pub fn edge_count(&self) -> usize {
        self.succ_targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn t(n: u32) -> Temp {
        Temp::Virtual(n)
    }

    fn loop_body() -> Vec<Instr> {
        let (top, done) = (Label::new("L"), Label::new("done"));
        vec![
            Instr::label("L:", top.clone()),
            Instr::oper("cmpq    $0, `s0", vec![], vec![t(1)]),
            Instr::branch("je      `j0", vec![], vec![done.clone(), Label::new("body")]),
            Instr::label("body:", Label::new("body")),
            Instr::mov("movq    `s0, `d0", t(2), t(1)),
            Instr::jump("jmp     `j0", vec![top]),
            Instr::label("done:", done),
        ]
    }

    #[test]
    fn test_fallthrough_and_jump_edges() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let instrs = loop_body();
        let graph = FlowGraph::build(&session, &instrs);

        assert_eq!(graph.len(), 7);
        assert_eq!(graph.succ(0), &[1]);
        // Conditional branch: fallthrough first, then `done`; `body` is the fallthrough.
        assert_eq!(graph.succ(2), &[3, 6]);
        // Unconditional jump only reaches its target.
        assert_eq!(graph.succ(5), &[0]);
        assert!(graph.succ(6).is_empty());
        assert_eq!(graph.edge_count(), 7);
    }

    #[test]
    fn test_predecessors_mirror_successors() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let instrs = loop_body();
        let graph = FlowGraph::build(&session, &instrs);

        assert_eq!(graph.pred(0), &[5]);
        assert_eq!(graph.pred(6), &[2]);
        for from in graph.nodes() {
            for &to in graph.succ(from) {
                assert!(graph.pred(to).contains(&from));
            }
        }
    }

    #[test]
    fn test_move_nodes_and_sets() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let instrs = loop_body();
        let graph = FlowGraph::build(&session, &instrs);

        assert!(graph.is_move(4));
        assert!(!graph.is_move(1));
        assert_eq!(graph.def(4), &[t(2)]);
        assert_eq!(graph.use_(4), &[t(1)]);
    }

    #[test]
    fn test_unknown_target_is_skipped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let instrs = vec![Instr::jump("jmp     `j0", vec![Label::new("elsewhere")])];
        let graph = FlowGraph::build(&session, &instrs);
        assert!(graph.succ(0).is_empty());
        assert!(graph.pred(0).is_empty());
    }
}
