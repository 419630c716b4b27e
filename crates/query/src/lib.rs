//! Beacon Query - store collaborator for the analytics engine
//!
//! The engine never builds query text. It hands a typed [`StoreRequest`] to a
//! [`QueryBackend`], which renders and executes it:
//! - **ClickHouse**: production store over HTTP
//! - **Fixture**: JSON fixtures for local development and tests
//!
//! # Usage
//!
//! ```ignore
//! use beacon_query::{ClickHouseBackend, ClickHouseBackendConfig, QueryBackend};
//!
//! let backend = ClickHouseBackend::new(&ClickHouseBackendConfig::new(url, "analytics"));
//! let result = backend.execute(&request).await?;
//! println!("Rows: {}", result.row_count);
//! ```

pub mod backend;
pub mod error;
pub mod request;
pub mod result;

// Re-exports
pub use backend::QueryBackend;
pub use backend::clickhouse::{ClickHouseBackend, ClickHouseBackendConfig};
pub use backend::fixture::{
    CohortFixture, FixtureBackend, FixtureData, FixturePoint, SeriesFixture,
};
pub use error::QueryError;
pub use request::{
    BranchFilter, EnvironmentFilter, Granularity, RequestFilters, StoreMetric, StoreRequest,
    Window,
};
pub use result::{Column, DATE_COLUMN, DataType, OFFSET_COLUMN, QueryResult, VALUE_COLUMN};
