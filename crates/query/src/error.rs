//! Query error types

/// Errors that can occur during store query execution
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Connection failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Query execution failed
    #[error("query execution failed: {0}")]
    Execution(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// ClickHouse error
    #[error("clickhouse error: {0}")]
    ClickHouse(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}
