//! Vectorize Compiler CLI
//!
//! Command-line driver for the expression compiler: load a schema and a
//! batch of expressions from the wire format (§6.6), validate them against
//! the builtin registry, and optionally emit the generated LLVM IR without
//! invoking clang — the same `compile_to_ir`-vs-`compile_file` split the
//! teacher's own CLI draws between a dry run and a full build.

use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;
use std::process;
use vectorize_compiler::registry::Registry;
use vectorize_compiler::{projector, validator, wire};

#[derive(ClapParser)]
#[command(name = "vectorizec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Vectorize expression compiler - validate and compile expression batches", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a wire-encoded schema and expression batch
    Validate {
        /// Path to a binary-encoded `ExpressionTree` message
        input: PathBuf,
    },

    /// Validate and print the LLVM IR a batch of expressions would compile to
    EmitIr {
        /// Path to a binary-encoded `ExpressionTree` message
        input: PathBuf,

        /// Write the IR to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { input } => run_validate(&input),
        Commands::EmitIr { input, output } => run_emit_ir(&input, output.as_deref()),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn load_tree(input: &std::path::Path) -> Result<(vectorize_core::Schema, Vec<vectorize_core::Expression>), String> {
    let bytes = std::fs::read(input).map_err(|e| format!("failed to read {}: {e}", input.display()))?;
    wire::decode(&bytes).map_err(|e| e.to_string())
}

fn run_validate(input: &std::path::Path) -> Result<(), String> {
    let (schema, expressions) = load_tree(input)?;
    let registry = Registry::with_builtins();
    for (index, expr) in expressions.iter().enumerate() {
        validator::validate(expr, &schema, &registry).map_err(|e| format!("expression {index}: {e}"))?;
    }
    println!("{} expression(s) valid against the given schema", expressions.len());
    Ok(())
}

fn run_emit_ir(input: &std::path::Path, output: Option<&std::path::Path>) -> Result<(), String> {
    let (schema, expressions) = load_tree(input)?;
    let ir = projector::emit_ir(&schema, &expressions).map_err(|e| e.to_string())?;
    match output {
        Some(path) => std::fs::write(path, ir).map_err(|e| format!("failed to write {}: {e}", path.display())),
        None => {
            print!("{ir}");
            Ok(())
        }
    }
}
