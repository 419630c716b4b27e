//! Aggregation engine limits

use std::time::Duration;

use serde::Deserialize;

/// Default number of store queries allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 16;

/// Default cap on cohort anchor days per retention computation
pub const DEFAULT_COHORT_MAX_DAYS: u32 = 90;

/// Engine configuration
///
/// # Example
///
/// ```toml
/// [engine]
/// max_concurrent_queries = 16
/// cohort_max_days = 90
/// request_timeout = "30s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Store queries in flight across one engine (entities, metrics, cohorts)
    /// Default: 16
    pub max_concurrent_queries: usize,

    /// Maximum number of anchor days in one retention computation
    /// Default: 90
    pub cohort_max_days: u32,

    /// Caller-level timeout; outstanding sub-queries are cancelled when it fires
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
            cohort_max_days: DEFAULT_COHORT_MAX_DAYS,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Override the concurrency limit
    pub fn with_max_concurrent_queries(mut self, max: usize) -> Self {
        self.max_concurrent_queries = max;
        self
    }

    /// Override the cohort safety cap
    pub fn with_cohort_max_days(mut self, days: u32) -> Self {
        self.cohort_max_days = days;
        self
    }

    /// Override the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
