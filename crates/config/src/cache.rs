//! Metric cache configuration
//!
//! Entries whose window touches the current day are still receiving data,
//! so they expire quickly. Fully historical windows are effectively immutable.

use std::time::Duration;

use serde::Deserialize;

/// Cache configuration
///
/// # Example
///
/// ```toml
/// [cache]
/// capacity = 100000
/// today_ttl = "5m"
/// historical_ttl = "7d"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached query results
    /// Default: 100000
    pub capacity: usize,

    /// TTL for results whose window ends on or after the start of today
    /// Default: 5m
    #[serde(with = "humantime_serde")]
    pub today_ttl: Duration,

    /// TTL for fully historical results
    /// Default: 7d
    #[serde(with = "humantime_serde")]
    pub historical_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            today_ttl: Duration::from_secs(5 * 60),
            historical_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}
