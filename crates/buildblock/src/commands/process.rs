//! `buildblock process` command implementation.

use std::path::PathBuf;

use buildblock_engine::Invocation;
use clap::Args;

use super::{OverrideArgs, execute_jobs};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the process command.
#[derive(Args)]
pub(crate) struct ProcessArgs {
    /// Source files, processed in order.
    #[arg(required = true, value_name = "SRC")]
    sources: Vec<PathBuf>,

    /// Output file (sources are concatenated) or directory (trailing `/`).
    #[arg(short, long, value_name = "DEST")]
    output: PathBuf,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl ProcessArgs {
    /// Execute the process command.
    ///
    /// Uses the `[options]` of the configuration, ignoring its file jobs.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or any file fails to process.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.overrides.load_config()?;
        let job = Invocation::new(self.sources, self.output);
        execute_jobs(config, &[job], &output)
    }
}
