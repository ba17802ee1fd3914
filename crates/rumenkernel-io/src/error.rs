//! Error types for ingestion and export.

use thiserror::Error;

/// Result type alias using `IngestError`.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while reading or writing tabular files.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Required columns are absent from the table header.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Create a missing-columns error.
    pub fn missing<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingColumns(columns.into_iter().map(Into::into).collect())
    }
}
