//! Domain error types for access-code operations.

use rsgate_storage::StorageError;
use thiserror::Error;

/// Domain-specific errors for access-code operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Empty/malformed code, or a non-positive generation count.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The retry budget ran out before the requested number of unique
    /// codes could be secured. Signals the requested count is too large
    /// for the remaining alphabet/length space.
    #[error("generation exhausted after {attempts} attempts: secured {secured} of {requested}")]
    GenerationExhausted {
        requested: usize,
        secured: usize,
        attempts: usize,
    },

    /// Redemption target never existed.
    #[error("code not found: {code}")]
    NotFound { code: String },

    /// Redemption target was already consumed or deleted.
    #[error("code already used: {code}")]
    AlreadyUsed { code: String },

    /// The underlying store failed. Safe to retry: every write path is
    /// either idempotent or atomic and self-checking.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

/// Result type for access-code operations.
pub type AccessResult<T> = Result<T, AccessError>;
