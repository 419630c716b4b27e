//! Cache error types

use thiserror::Error;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache could not be reached
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A value could not be stored
    #[error("cache write failed: {0}")]
    Write(String),
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
