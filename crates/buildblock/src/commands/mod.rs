//! CLI command implementations.

mod process;
mod run;

use std::path::PathBuf;

use buildblock_config::{CliSettings, Config};
use buildblock_engine::{Invocation, Processor, batch};
use clap::Args;

pub(crate) use process::ProcessArgs;
pub(crate) use run::RunArgs;

use crate::error::CliError;
use crate::output::Output;

/// Option overrides shared by every command.
#[derive(Args, Debug, Default)]
pub(crate) struct OverrideArgs {
    /// Path to configuration file (default: auto-discover buildblock.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target environment (overrides config).
    #[arg(short = 'e', long = "env", env = "BUILDBLOCK_ENV")]
    environment: Option<String>,

    /// Remove every `remove` block regardless of targets.
    #[arg(long)]
    strip: bool,

    /// Disable strip mode (overrides config).
    #[arg(long, conflicts_with = "strip")]
    no_strip: bool,

    /// Process directives inside included files.
    #[arg(long)]
    recursive: bool,

    /// Insert included files unprocessed (overrides config).
    #[arg(long, conflicts_with = "recursive")]
    no_recursive: bool,

    /// Directive comment marker (overrides config).
    #[arg(short = 'm', long = "marker")]
    marker: Option<String>,

    /// Template data entry, repeatable.
    #[arg(short = 'd', long = "data", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    data: Vec<(String, String)>,

    /// Declarative block type source, repeatable.
    #[arg(long = "block-type", value_name = "PATH")]
    block_types: Vec<PathBuf>,

    /// Enable verbose output (per-file logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl OverrideArgs {
    /// Settings applied on top of the configuration file.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            environment: self.environment.clone(),
            strip: resolve_flag(self.strip, self.no_strip),
            recursive: resolve_flag(self.recursive, self.no_recursive),
            comment_marker: self.marker.clone(),
            data: self.data.clone(),
            custom_block_types: self.block_types.clone(),
        }
    }

    /// Load the configuration with these overrides applied.
    fn load_config(&self) -> Result<Config, CliError> {
        Ok(Config::load(
            self.config.as_deref(),
            Some(&self.cli_settings()),
        )?)
    }
}

/// Resolve a `--flag` / `--no-flag` pair. Neither set leaves the config value.
fn resolve_flag(on: bool, off: bool) -> Option<bool> {
    if on {
        Some(true)
    } else if off {
        Some(false)
    } else {
        None
    }
}

/// Parse a `key=value` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

/// Process jobs with the configured options and report the outcome.
fn execute_jobs(config: Config, jobs: &[Invocation], output: &Output) -> Result<(), CliError> {
    if let Some(path) = &config.config_path {
        output.info(&format!("Config: {}", path.display()));
    }
    if let Some(environment) = &config.options.environment {
        output.info(&format!("Environment: {environment}"));
    }

    let processor = Processor::new(config.options)?;
    let report = batch::run_all(&processor, jobs);
    output.report(&report);

    let total = jobs.iter().map(|job| job.src.len()).sum();
    if !report.is_success() {
        return Err(CliError::Failed {
            failed: report.failures.len(),
            total,
        });
    }

    output.highlight(&format!(
        "Processed {total} file(s), wrote {}",
        report.written.len()
    ));
    Ok(())
}
