//! Configuration validation
//!
//! Validates config consistency:
//! - The selected store backend has what it needs
//! - Engine limits are usable (non-zero pool, bounded cohort loop)
//! - Cache TTLs are ordered (today entries never outlive historical ones)

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::query::QueryBackend;

/// Upper bound for `cohort_max_days`
const MAX_COHORT_DAYS: u32 = 366;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_query(config)?;
    validate_cache(config)?;
    validate_engine(config)?;
    Ok(())
}

fn validate_query(config: &Config) -> Result<()> {
    match config.query.backend {
        QueryBackend::Fixture => {
            if config.query.fixture_path.is_none() {
                return Err(ConfigError::missing_field("query", "fixture_path"));
            }
        }
        QueryBackend::Clickhouse => {
            if let Some(url) = &config.query.url
                && !(url.starts_with("http://") || url.starts_with("https://"))
            {
                return Err(ConfigError::invalid_value(
                    "query",
                    "url",
                    format!("'{}' must start with http:// or https://", url),
                ));
            }
        }
    }

    if config.query.max_execution_time.is_zero() {
        return Err(ConfigError::invalid_value(
            "query",
            "max_execution_time",
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_cache(config: &Config) -> Result<()> {
    let cache = &config.cache;

    if cache.capacity == 0 {
        return Err(ConfigError::invalid_value(
            "cache",
            "capacity",
            "must be at least 1",
        ));
    }

    if cache.today_ttl > cache.historical_ttl {
        return Err(ConfigError::invalid_value(
            "cache",
            "today_ttl",
            "must not exceed historical_ttl",
        ));
    }

    Ok(())
}

fn validate_engine(config: &Config) -> Result<()> {
    let engine = &config.engine;

    if engine.max_concurrent_queries == 0 {
        return Err(ConfigError::invalid_value(
            "engine",
            "max_concurrent_queries",
            "must be at least 1",
        ));
    }

    if engine.cohort_max_days == 0 || engine.cohort_max_days > MAX_COHORT_DAYS {
        return Err(ConfigError::invalid_value(
            "engine",
            "cohort_max_days",
            format!("must be between 1 and {}", MAX_COHORT_DAYS),
        ));
    }

    if engine.request_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "engine",
            "request_timeout",
            "must be greater than zero",
        ));
    }

    Ok(())
}
