// This module ties instruction selection together. A Target supplies the immutable rule tables,
// creates frames for the text reader and renders data words; the CodeGenerator walks a fragment
// list in order, munches each procedure body with the target's rules and the fragment's own
// frame, and renders each data fragment as a label followed by one directive per word. Any
// fatal error aborts the whole run: apply() returns Err and no partially selected procedure is
// handed downstream. The session records per-procedure statistics as fragments complete.

//! Instruction selection driver.
//!
//! ```ignore
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let target = X86_64Target::new();
//! let assembly = CodeGenerator::new(&target, &session).apply(&fragments)?;
//! print!("{assembly}");
//! ```

pub mod instr;
pub mod muncher;
pub mod patterns;

pub use instr::Instr;
pub use muncher::{munch_body, Muncher, MuncherRules, RuleTable};

use crate::core::error::CodegenResult;
use crate::core::session::CompilationSession;
use crate::ir::{DataFragment, Exp, Fragment, Frame, Label, ProcFragment, Temp};
use std::fmt;

/// Target-specific hooks of the code generator.
pub trait Target {
    fn name(&self) -> &'static str;

    /// Rule tables, built once per target.
    fn rules(&self) -> &MuncherRules;

    fn new_frame(&self, name: Label) -> Box<dyn Frame>;

    /// Machine register named `name` (e.g. `%rax`).
    fn register(&self, name: &str) -> Option<Temp>;

    /// Directive emitting one initializer word of a data fragment.
    fn data_word(&self, word: &Exp) -> CodegenResult<Instr>;
}

/// Selected instructions of one fragment.
#[derive(Debug, Clone)]
pub enum AssemFragment {
    Proc { name: Label, body: Vec<Instr> },
    Data { label: Label, body: Vec<Instr> },
}

impl AssemFragment {
    pub fn name(&self) -> &Label {
        match self {
            AssemFragment::Proc { name, .. } => name,
            AssemFragment::Data { label, .. } => label,
        }
    }

    pub fn body(&self) -> &[Instr] {
        match self {
            AssemFragment::Proc { body, .. } | AssemFragment::Data { body, .. } => body,
        }
    }

    pub fn is_proc(&self) -> bool {
        matches!(self, AssemFragment::Proc { .. })
    }
}

/// Output of a code generation run, in input order.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub fragments: Vec<AssemFragment>,
}

impl Assembly {
    pub fn procedures(&self) -> impl Iterator<Item = &AssemFragment> {
        self.fragments.iter().filter(|f| f.is_proc())
    }

    /// Look up a fragment by name.
    pub fn get(&self, name: &str) -> Option<&AssemFragment> {
        self.fragments.iter().find(|f| f.name().name() == name)
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                AssemFragment::Proc { name, .. } => writeln!(f, "# procedure {name}")?,
                AssemFragment::Data { label, .. } => writeln!(f, "# data {label}")?,
            }
            for instr in fragment.body() {
                if instr.label_name().is_some() {
                    writeln!(f, "{instr}")?;
                } else {
                    writeln!(f, "        {instr}")?;
                }
            }
        }
        Ok(())
    }
}

/// Runs instruction selection over fragments for one target.
pub struct CodeGenerator<'a, 'arena> {
    target: &'a dyn Target,
    session: &'a CompilationSession<'arena>,
}

impl<'a, 'arena> CodeGenerator<'a, 'arena> {
    pub fn new(target: &'a dyn Target, session: &'a CompilationSession<'arena>) -> Self {
        Self { target, session }
    }

    /// Select instructions for every fragment. Stops at the first fatal error.
    pub fn apply(&self, fragments: &[Fragment]) -> CodegenResult<Assembly> {
        let mut assembly = Assembly::default();
        for fragment in fragments {
            let assembled = match fragment {
                Fragment::Proc(proc) => self.generate_proc(proc)?,
                Fragment::Data(data) => self.generate_data(data)?,
            };
            assembly.fragments.push(assembled);
        }
        Ok(assembly)
    }

    pub fn generate_proc(&self, proc: &ProcFragment) -> CodegenResult<AssemFragment> {
        let name = proc.frame.name().clone();
        self.session.set_current_procedure(name.name());

        let result = munch_body(self.target.rules(), proc.frame.as_ref(), self.session, &proc.body);
        self.session.clear_procedure_state();
        let body = result?;

        log::debug!(
            "{}: selected {} instructions for {name} ({} temporaries so far)",
            self.target.name(),
            body.len(),
            self.session.temp_count()
        );
        self.session.record_procedure_compiled(name.name(), body.len());
        Ok(AssemFragment::Proc { name, body })
    }

    pub fn generate_data(&self, data: &DataFragment) -> CodegenResult<AssemFragment> {
        let mut body = Vec::with_capacity(data.words.len() + 1);
        body.push(Instr::label(format!("{}:", data.label), data.label.clone()));
        for word in &data.words {
            body.push(self.target.data_word(word)?);
        }
        self.session.record_data_compiled();
        Ok(AssemFragment::Data {
            label: data.label.clone(),
            body,
        })
    }
}
