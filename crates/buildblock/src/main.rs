//! buildblock CLI - build-block directive processor.
//!
//! Provides commands for:
//! - `run`: Process every `[[files]]` job from `buildblock.toml`
//! - `process`: Process ad-hoc source files

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ProcessArgs, RunArgs};
use output::Output;

/// buildblock - rewrite HTML sources by their build-block directives.
#[derive(Parser)]
#[command(name = "buildblock", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every file job from the configuration.
    Run(RunArgs),
    /// Process the given source files.
    Process(ProcessArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Run(args) => args.overrides.verbose,
            Self::Process(args) => args.overrides.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => args.execute(),
        Commands::Process(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
