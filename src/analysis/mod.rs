//! Dataflow analysis over selected instructions.
//!
//! - [`flow_graph`] - instruction-level control-flow graph
//! - [`network`] - monotone set-propagation network
//! - [`liveness`] - live-in/live-out sets solved on that network
//! - `dot` - Graphviz export of a graph with its liveness annotations

pub mod dot;
pub mod flow_graph;
pub mod liveness;
pub mod network;

pub use flow_graph::{FlowGraph, NodeId};
pub use liveness::Liveness;
pub use network::{LiveNetwork, SetId};
