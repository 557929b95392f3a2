//! munchc - run instruction selection and liveness over a textual IR file.
//!
//! # Usage
//!
//! ```bash
//! # Select instructions for every fragment
//! munchc program.ir
//!
//! # Also print live-in/live-out per instruction and write a Graphviz file
//! munchc program.ir --liveness --dot flow.dot
//!
//! # Show the x86-64 rule tables in priority order
//! munchc --dump-rules
//! ```

use bumpalo::Bump;
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use treemunch::analysis::{FlowGraph, Liveness};
use treemunch::codegen::{CodeGenerator, Target};
use treemunch::core::{CodegenError, CodegenResult, CompilationSession};
use treemunch::ir::text::IrReader;
use treemunch::x64::X86_64Target;

#[derive(Parser)]
#[command(name = "munchc")]
#[command(about = "Tree-pattern instruction selection for x86-64, with liveness", long_about = None)]
struct Cli {
    /// IR file to compile; reads standard input when omitted
    input: Option<PathBuf>,

    /// Print live-in/live-out sets for every instruction
    #[arg(long)]
    liveness: bool,

    /// Write the annotated flow graphs as a Graphviz document
    #[arg(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Print the rule tables in priority order
    #[arg(long)]
    dump_rules: bool,

    /// Print session statistics after compiling
    #[arg(long)]
    stats: bool,

    /// Raise the log level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_internal() => {
            eprintln!("internal compiler error: {err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CodegenResult<()> {
    let target = X86_64Target::new();
    if cli.dump_rules {
        print!("{}", target.rules());
        if cli.input.is_none() {
            return Ok(());
        }
    }

    let source = match &cli.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let fragments = IrReader::new(&target, &session).read_fragments(&source)?;
    let assembly = CodeGenerator::new(&target, &session).apply(&fragments)?;
    print!("{assembly}");

    if cli.liveness || cli.dot.is_some() {
        let mut dot = String::new();
        for fragment in assembly.procedures() {
            let graph = FlowGraph::build(&session, fragment.body());
            let liveness = Liveness::compute_in(&session, &graph);
            if cli.liveness {
                println!("# liveness {}", fragment.name());
                print!("{}", liveness.report());
            }
            if cli.dot.is_some() {
                dot.push_str(&liveness.to_dot(fragment.name().name()));
            }
        }
        if let Some(path) = &cli.dot {
            std::fs::write(path, dot).map_err(CodegenError::from)?;
            log::info!("wrote {}", path.display());
        }
    }

    if cli.stats {
        eprint!("{}", session.stats());
    }
    Ok(())
}
