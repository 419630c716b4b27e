//! Store backend trait and implementations

pub mod clickhouse;
pub mod fixture;

use async_trait::async_trait;

use crate::error::QueryError;
use crate::request::StoreRequest;
use crate::result::QueryResult;

/// Store collaborator
///
/// Implemented by the ClickHouse and fixture backends. A backend owns the
/// rendering of a [`StoreRequest`] into whatever its engine understands;
/// callers never build query text.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute a canonical request
    async fn execute(&self, request: &StoreRequest) -> Result<QueryResult, QueryError>;

    /// Check if backend is available
    async fn health_check(&self) -> Result<(), QueryError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
