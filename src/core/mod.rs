// This module gathers the infrastructure shared by every phase of the backend: the error type
// that all fallible operations return, and the compilation session that owns the arena, hands
// out fresh temporaries and collects statistics. Neither depends on a particular target.

//! Shared infrastructure.
//!
//! - [`error`] - `CodegenError` and the `CodegenResult` alias
//! - [`session`] - arena-backed `CompilationSession` and `SessionStats`

pub mod error;
pub mod session;

pub use error::{CodegenError, CodegenResult, RuleCategory};
pub use session::{CompilationSession, SessionStats};
