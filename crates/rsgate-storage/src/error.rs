//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error.
    #[error("database connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Health status reported by a code store.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the backend answered the probe.
    pub healthy: bool,
    /// Probe round-trip time.
    pub latency: std::time::Duration,
    /// Backend-specific detail.
    pub message: Option<String>,
}
