//! CLI error types.

use buildblock_config::ConfigError;
use buildblock_engine::ProcessError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Process(#[from] ProcessError),

    #[error("{0}")]
    Validation(String),

    #[error("{failed} of {total} file(s) failed")]
    Failed { failed: usize, total: usize },
}
