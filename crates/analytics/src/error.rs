//! Analytics error types

use std::time::Duration;

use thiserror::Error;

/// Analytics errors
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Malformed date filter or interval (e.g., end before start)
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// Unparseable date filter expression
    #[error("invalid date filter: {0}")]
    InvalidFilter(String),

    /// Upstream store query failed
    #[error("store query failed: {0}")]
    StoreQuery(#[from] beacon_query::QueryError),

    /// An entity ID could not be mapped to a store scope
    #[error("cannot resolve scope for entity '{entity}': {reason}")]
    ScopeResolution {
        /// Entity that failed to resolve
        entity: String,
        /// Why resolution failed
        reason: String,
    },

    /// The caller-level timeout fired; outstanding sub-queries were cancelled
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Nothing could be computed (store unreachable for every entity)
    #[error("analytics unavailable: {0}")]
    Unavailable(String),

    /// Cached or returned data could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Serialization(err.to_string())
    }
}

/// Result type for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;
