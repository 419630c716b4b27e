//! Store backend configuration
//!
//! Configuration for the store collaborator the engine queries
//! (ClickHouse over HTTP, or a JSON fixture file for offline use).

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryBackend {
    /// ClickHouse backend (production)
    #[default]
    Clickhouse,
    /// JSON fixture file (local development, demos)
    Fixture,
}

/// Query configuration
///
/// # Example
///
/// ```toml
/// [query]
/// backend = "clickhouse"
/// url = "http://localhost:8123"
/// database = "analytics"
///
/// # Or a fixture file for offline use
/// [query]
/// backend = "fixture"
/// fixture_path = "./fixtures/games.json"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Store backend type
    /// Default: clickhouse
    pub backend: QueryBackend,

    /// ClickHouse HTTP URL
    /// Default: "http://localhost:8123"
    pub url: Option<String>,

    /// ClickHouse database name
    /// Default: "default"
    pub database: Option<String>,

    /// ClickHouse username
    pub username: Option<String>,

    /// ClickHouse password
    pub password: Option<String>,

    /// Path to the JSON fixture file (when backend = fixture)
    pub fixture_path: Option<PathBuf>,

    /// Server-side execution limit for a single store query
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub max_execution_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            backend: QueryBackend::Clickhouse,
            url: None,
            database: None,
            username: None,
            password: None,
            fixture_path: None,
            max_execution_time: Duration::from_secs(60),
        }
    }
}

impl QueryConfig {
    /// Get the ClickHouse URL
    pub fn url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| "http://localhost:8123".to_string())
    }

    /// Get the ClickHouse database
    pub fn database(&self) -> String {
        self.database
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.backend, QueryBackend::Clickhouse);
        assert_eq!(config.url(), "http://localhost:8123");
        assert_eq!(config.database(), "default");
        assert_eq!(config.max_execution_time, Duration::from_secs(60));
    }

    #[test]
    fn test_clickhouse_config() {
        let toml = r#"
backend = "clickhouse"
url = "http://ch.example.com:8123"
database = "analytics"
username = "reader"
password = "secret"
max_execution_time = "15s"
"#;
        let config: QueryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.url(), "http://ch.example.com:8123");
        assert_eq!(config.database(), "analytics");
        assert_eq!(config.username.as_deref(), Some("reader"));
        assert_eq!(config.max_execution_time, Duration::from_secs(15));
    }

    #[test]
    fn test_fixture_config() {
        let toml = r#"
backend = "fixture"
fixture_path = "/var/lib/beacon/games.json"
"#;
        let config: QueryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backend, QueryBackend::Fixture);
        assert_eq!(
            config.fixture_path,
            Some(PathBuf::from("/var/lib/beacon/games.json"))
        );
    }
}
