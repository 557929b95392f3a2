// This module computes live-in and live-out sets for every node of a flow graph by wiring a
// LiveNetwork once per graph. Node n owns two sets, in[n] and out[n]. Two kinds of edges encode
// the dataflow equations: out[n] -> in[n] excluding def[n] gives in[n] = use[n] ∪ (out[n] \ def[n]),
// and in[s] -> out[n] for every successor s gives out[n] = ⋃ in[s]. Seeding each in[n] with
// use[n] then lets propagation settle at the classical least solution, loops included, because
// the network never re-fires for an element a set already holds.

//! Liveness analysis over a [`FlowGraph`].

use super::flow_graph::{FlowGraph, NodeId};
use super::network::{LiveNetwork, SetId};
use crate::core::session::CompilationSession;
use crate::ir::Temp;
use hashbrown::HashSet;

pub struct Liveness<'g> {
    graph: &'g FlowGraph<'g>,
    network: LiveNetwork<'g, Temp>,
}

impl<'g> Liveness<'g> {
    fn in_set(node: NodeId) -> SetId {
        2 * node
    }

    fn out_set(node: NodeId) -> SetId {
        2 * node + 1
    }

    /// Solve liveness for `graph`.
    pub fn compute(graph: &'g FlowGraph<'g>) -> Self {
        let mut network = LiveNetwork::with_capacity(2 * graph.len());
        for _ in graph.nodes() {
            network.add_set();
            network.add_set();
        }

        for node in graph.nodes() {
            network.add_edge(Self::out_set(node), Self::in_set(node), graph.def(node));
            for &succ in graph.succ(node) {
                network.add_edge(Self::in_set(succ), Self::out_set(node), &[]);
            }
        }

        for node in graph.nodes() {
            for &temp in graph.use_(node) {
                network.insert(Self::in_set(node), temp);
            }
        }

        log::debug!(
            "liveness: {} nodes, {} sets, {} edges, {} insertions, {} propagations",
            graph.len(),
            network.set_count(),
            network.edge_count(),
            network.inserted(),
            network.fired()
        );
        Self { graph, network }
    }

    /// Solve liveness and record the propagation count in `session`.
    pub fn compute_in(session: &CompilationSession<'_>, graph: &'g FlowGraph<'g>) -> Self {
        let liveness = Self::compute(graph);
        session.record_propagations(liveness.propagations());
        liveness
    }

    pub fn graph(&self) -> &'g FlowGraph<'g> {
        self.graph
    }

    pub fn live_in(&self, node: NodeId) -> &HashSet<Temp> {
        self.network.set(Self::in_set(node))
    }

    pub fn live_out(&self, node: NodeId) -> &HashSet<Temp> {
        self.network.set(Self::out_set(node))
    }

    /// Live-in set in a stable order, for printing and comparison.
    pub fn live_in_sorted(&self, node: NodeId) -> Vec<Temp> {
        sorted(self.live_in(node))
    }

    pub fn live_out_sorted(&self, node: NodeId) -> Vec<Temp> {
        sorted(self.live_out(node))
    }

    /// Listener activations performed while solving.
    pub fn propagations(&self) -> usize {
        self.network.fired()
    }

    /// Per-node listing: `[in] n: instr [out]`.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for node in self.graph.nodes() {
            out.push_str(&format!(
                "{:>4}: {:<32} in={} out={}\n",
                node,
                self.graph.instr(node).to_string(),
                format_set(&self.live_in_sorted(node)),
                format_set(&self.live_out_sorted(node)),
            ));
        }
        out
    }
}

fn sorted(set: &HashSet<Temp>) -> Vec<Temp> {
    let mut temps: Vec<Temp> = set.iter().copied().collect();
    temps.sort();
    temps
}

/// `[a, b, c]`, the way sorted live sets are shown.
pub(crate) fn format_set(temps: &[Temp]) -> String {
    let names: Vec<String> = temps.iter().map(Temp::to_string).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Instr;
    use crate::ir::Label;
    use bumpalo::Bump;

    fn t(n: u32) -> Temp {
        Temp::Virtual(n)
    }

    #[test]
    fn test_straight_line() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let instrs = vec![
            Instr::oper("movq    $5, `d0", vec![t(1)], vec![]),
            Instr::oper("leaq    3(`s0), `d0", vec![t(2)], vec![t(1)]),
        ];
        let graph = FlowGraph::build(&session, &instrs);
        let live = Liveness::compute(&graph);

        assert!(live.live_in(0).is_empty());
        assert_eq!(live.live_out_sorted(0), vec![t(1)]);
        assert_eq!(live.live_in_sorted(1), vec![t(1)]);
        assert!(live.live_out(1).is_empty());
    }

    #[test]
    fn test_definition_kills() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        // t1 := t1 + t2 reads and writes t1; t1 stays live-in.
        let instrs = vec![
            Instr::oper("addq    `s0, `d0", vec![t(1)], vec![t(2), t(1)]),
            Instr::oper("movq    $0, `d0", vec![t(2)], vec![]),
            Instr::ret("ret", vec![t(1), t(2)]),
        ];
        let graph = FlowGraph::build(&session, &instrs);
        let live = Liveness::compute(&graph);

        assert_eq!(live.live_in_sorted(0), vec![t(1), t(2)]);
        assert_eq!(live.live_out_sorted(0), vec![t(1)]);
        assert_eq!(live.live_in_sorted(1), vec![t(1)]);
        assert_eq!(live.live_out_sorted(1), vec![t(1), t(2)]);
    }

    #[test]
    fn test_back_edge_carries_liveness() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let (top, done) = (Label::new("L"), Label::new("done"));
        let instrs = vec![
            Instr::oper("movq    $8, `d0", vec![t(9)], vec![]),
            Instr::label("L:", top.clone()),
            Instr::oper("cmpq    $0, `s0", vec![], vec![t(1)]),
            Instr::branch("je      `j0", vec![], vec![done.clone()]),
            Instr::oper("addq    `s0, `d0", vec![t(1)], vec![t(9), t(1)]),
            Instr::jump("jmp     `j0", vec![top]),
            Instr::label("done:", done),
        ];
        let graph = FlowGraph::build(&session, &instrs);
        let live = Liveness::compute(&graph);

        for node in 1..=5 {
            assert!(live.live_in(node).contains(&t(9)), "t9 live-in at {node}");
        }
        assert!(live.live_out(0).contains(&t(9)));
        assert!(live.live_in(6).is_empty());
    }

    #[test]
    fn test_report_lists_every_node() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let instrs = vec![
            Instr::oper("movq    $1, `d0", vec![t(3)], vec![]),
            Instr::ret("ret", vec![t(3)]),
        ];
        let graph = FlowGraph::build(&session, &instrs);
        let live = Liveness::compute_in(&session, &graph);

        let report = live.report();
        assert_eq!(report.lines().count(), 2);
        assert!(report.lines().next().unwrap().ends_with("in=[] out=[t3]"));
        assert_eq!(session.stats().liveness_propagations, live.propagations());
    }
}
