//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while reading raw series.
#[derive(Debug, Error)]
pub enum DataError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// The source has nothing for an identifier
    #[error("Missing data for {id}: {reason}")]
    MissingData {
        /// Requested identifier
        id: String,
        /// Reason for missing data
        reason: String,
    },

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Structurally unusable input, e.g. a file without a value column
    #[error("Invalid series: {0}")]
    InvalidSeries(String),
}

impl DataError {
    /// Shorthand for [`DataError::MissingData`].
    pub fn missing(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingData {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
