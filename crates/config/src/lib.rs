//! Beacon Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid config: ClickHouse on localhost, an in-process
//! cache, and conservative engine limits.
//!
//! # Parsing
//!
//! ```
//! use beacon_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[engine]\nmax_concurrent_queries = 8").unwrap();
//! assert_eq!(config.engine.max_concurrent_queries, 8);
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [query]
//! backend = "clickhouse"
//! url = "http://localhost:8123"
//! database = "analytics"
//!
//! [cache]
//! today_ttl = "5m"
//! historical_ttl = "7d"
//!
//! [engine]
//! max_concurrent_queries = 16
//! cohort_max_days = 90
//! request_timeout = "30s"
//! ```

mod cache;
mod engine;
mod error;
mod logging;
mod query;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use cache::CacheConfig;
pub use engine::{DEFAULT_COHORT_MAX_DAYS, DEFAULT_MAX_CONCURRENT_QUERIES, EngineConfig};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use query::{QueryBackend, QueryConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Store backend configuration
    pub query: QueryConfig,

    /// Metric cache configuration
    pub cache: CacheConfig,

    /// Aggregation engine limits
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
