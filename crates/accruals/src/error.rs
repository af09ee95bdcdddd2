//! Error types for pipeline runs.

use accruals_data::DataError;
use accruals_output::{ExportError, ReportError};
use accruals_signal::SignalError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal errors of a pipeline run.
///
/// Row- and group-level conditions never surface here; they are counted in
/// the stage statistics instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input loading failed.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Signal parameters were rejected.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Writing or reading the panel failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Writing the run report failed.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file unreadable.
    #[error("IO error on {}: {error}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        error: std::io::Error,
    },
}
