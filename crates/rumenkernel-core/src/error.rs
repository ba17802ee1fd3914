//! Error types for RumenKernels.
//!
//! Only structural failures are errors. Per-day and per-event analysis failures
//! are reported as diagnostics by the analysis kernels and never surface here.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias using `KernelError`.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors that can occur during kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Kernel not found in registry.
    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    /// Kernel already registered.
    #[error("Kernel already registered: {0}")]
    KernelAlreadyRegistered(String),

    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl KernelError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        KernelError::ValidationError(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        KernelError::InternalError(msg.into())
    }

    /// Create a kernel not found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        KernelError::KernelNotFound(id.into())
    }

    /// Returns true if only the current source should be skipped.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KernelError::ValidationError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = KernelError::validation("period_hours must be positive");
        assert_eq!(
            err.to_string(),
            "Input validation failed: period_hours must be positive"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_internal_not_recoverable() {
        assert!(!KernelError::internal("boom").is_recoverable());
        assert!(KernelError::validation("bad").is_recoverable());
    }
}
