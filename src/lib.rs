//! treemunch - tree-pattern instruction selection and liveness for a compiler backend.
//!
//! Canonical IR trees go in, abstract x86-64 instructions with symbolic
//! registers come out, together with the live-in/live-out sets a register
//! allocator needs.
//!
//! # Primary Usage
//!
//! ```ignore
//! use treemunch::analysis::{FlowGraph, Liveness};
//! use treemunch::codegen::{AssemFragment, CodeGenerator};
//! use treemunch::core::CompilationSession;
//! use treemunch::ir::text::IrReader;
//! use treemunch::x64::X86_64Target;
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let target = X86_64Target::new();
//!
//! let fragments = IrReader::new(&target, &session).read_fragments(source)?;
//! let assembly = CodeGenerator::new(&target, &session).apply(&fragments)?;
//! for fragment in assembly.procedures() {
//!     let graph = FlowGraph::build(&session, fragment.body());
//!     let liveness = Liveness::compute_in(&session, &graph);
//!     print!("{}", liveness.report());
//! }
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - canonical IR trees, frames, fragments and a text reader
//! - [`codegen`] - tree patterns, rule tables, the muncher and instructions
//! - [`x64`] - the x86-64 frame, condition codes and rule set
//! - [`analysis`] - flow graphs, the propagation network and liveness
//! - [`core`] - errors and the compilation session

pub mod analysis;
pub mod codegen;
pub mod core;
pub mod ir;
pub mod x64;

pub use crate::analysis::{FlowGraph, Liveness};
pub use crate::codegen::{Assembly, CodeGenerator, Instr, MuncherRules, Target};
pub use crate::core::{CodegenError, CodegenResult, CompilationSession, SessionStats};
pub use crate::x64::X86_64Target;
