//! Query result types
//!
//! Unified row format returned by every store backend.
//!
//! Series metrics (active users, new users, revenue) return a `date` column
//! and a `value` column, one row per populated bucket. Retention returns an
//! `offset` column (day offset from the cohort anchor) and a `value` column.

use serde::{Deserialize, Serialize};

/// Column name carrying the bucket timestamp of a series row
pub const DATE_COLUMN: &str = "date";
/// Column name carrying the cohort day offset of a retention row
pub const OFFSET_COLUMN: &str = "offset";
/// Column name carrying the aggregated value
pub const VALUE_COLUMN: &str = "value";

/// Unified query result across all backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column definitions
    pub columns: Vec<Column>,

    /// Row data as JSON values (backend-agnostic)
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Total row count
    pub row_count: usize,

    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(
        columns: Vec<Column>,
        rows: Vec<Vec<serde_json::Value>>,
        execution_time_ms: u64,
    ) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time_ms: 0,
        }
    }

    /// Check if result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Data type
    pub data_type: DataType,

    /// Whether the column is nullable
    pub nullable: bool,
}

impl Column {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Data types supported in query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 64-bit floating point
    Float64,
    /// UTF-8 string
    String,
    /// Boolean
    Boolean,
    /// Timestamp
    Timestamp,
    /// JSON object
    Json,
    /// Unknown/other type
    Unknown,
}
