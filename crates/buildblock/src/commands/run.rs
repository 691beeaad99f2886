//! `buildblock run` command implementation.

use clap::Args;

use super::{OverrideArgs, execute_jobs};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the run command.
#[derive(Args)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl RunArgs {
    /// Execute the run command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, no jobs are configured, or any
    /// file fails to process.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let mut config = self.overrides.load_config()?;

        if config.jobs().is_empty() {
            return Err(CliError::Validation(
                "no [[files]] jobs configured (is buildblock.toml present?)".to_owned(),
            ));
        }

        let jobs = std::mem::take(&mut config.jobs);
        execute_jobs(config, &jobs, &output)
    }
}
