//! Error types for signal construction.

use thiserror::Error;

/// Result type for signal operations.
pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors that can occur while constructing the signal.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Too few observations for a regression group.
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Available number of observations
        actual: usize,
    },

    /// Design matrix without full column rank.
    #[error("singular design matrix: rank {rank} < columns {columns}")]
    Singular {
        /// Numerical rank
        rank: usize,
        /// Number of columns
        columns: usize,
    },

    /// Dimension mismatch between inputs.
    #[error("dimension mismatch for {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
        /// Context description
        context: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SignalError {
    /// Whether the error only invalidates one regression group.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. } | Self::Singular { .. })
    }
}
