//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading the accounting and master inputs.
///
/// Every variant is fatal for a run: without the join keys there is no
/// meaningful partial output.
#[derive(Debug, Error)]
pub enum DataError {
    /// Required column absent from the input header
    #[error("Missing required column '{column}' in {source_name}")]
    MissingColumn {
        /// Input the column was expected in
        source_name: String,
        /// Name of the missing column
        column: String,
    },

    /// Cell value that cannot be parsed into its column type
    #[error("Cannot parse {column}={value:?} in {source_name} at line {line}")]
    Parse {
        /// Input the cell belongs to
        source_name: String,
        /// Line number (1-based, header is line 1)
        line: u64,
        /// Column name
        column: String,
        /// Raw cell text
        value: String,
    },

    /// Null value in a primary key column
    #[error("Null primary key column '{column}' in {source_name} at line {line}")]
    NullKey {
        /// Input the row belongs to
        source_name: String,
        /// Line number (1-based, header is line 1)
        line: u64,
        /// Key column name
        column: String,
    },

    /// Malformed month identifier
    #[error("Invalid month identifier: {0}")]
    InvalidMonth(String),

    /// CSV reader error
    #[error("CSV error in {source_name}: {error}")]
    Csv {
        /// Input being read
        source_name: String,
        /// Underlying error
        #[source]
        error: csv::Error,
    },

    /// IO error
    #[error("IO error on {path}: {error}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        error: std::io::Error,
    },
}

impl DataError {
    pub(crate) fn csv(source_name: &str, error: csv::Error) -> Self {
        Self::Csv {
            source_name: source_name.to_string(),
            error,
        }
    }
}
