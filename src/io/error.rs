//! Errors raised by the command runner
//!
//! These are fatal for a run (the input cannot be read, the report cannot be
//! written). Per-command failures are `LedgerError`s and never abort a run.

use crate::types::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to open file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build report: {0}")]
    Report(#[from] LedgerError),
}

impl RunnerError {
    pub fn open(path: &std::path::Path, source: std::io::Error) -> Self {
        RunnerError::Open {
            path: path.display().to_string(),
            source,
        }
    }
}
