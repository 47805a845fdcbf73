//! Cache error types.

use offline_core::ResponseError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failed to serialize/deserialize a store.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response body could not be captured.
    #[error(transparent)]
    Body(#[from] ResponseError),

    /// A bulk prefetch entry could not be fetched.
    #[error("failed to prefetch {url}: {reason}")]
    Install { url: String, reason: String },
}
