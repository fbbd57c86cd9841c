//! Error types for the CLI

use event_loop::SchedulerError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// A scheduling call in the script was rejected
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// The script could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// A cancel/ref/unref op named a label that was never scheduled
    #[error("unknown label '{0}'")]
    UnknownLabel(String),
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::Parse(err.to_string())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
