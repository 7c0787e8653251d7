//! Error types for cache writes.

use thiserror::Error;

/// Cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Serialisation of an entry failed.
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
