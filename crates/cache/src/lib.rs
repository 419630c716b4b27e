//! Beacon Cache - query result cache collaborator
//!
//! The engine stores serialized query results under a request fingerprint.
//! Values are a pure function of their key, so concurrent writers of the same
//! key are harmless: the last write wins and every write carries the same value.
//!
//! - [`CacheStore`]: the collaborator trait (`get`, `set` with optional TTL)
//! - [`MemoryCache`]: in-process TTL cache backed by `DashMap`

mod error;
mod memory;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{CacheError, Result};
pub use memory::{CacheStats, MemoryCache};

/// Cache collaborator
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any existing entry
    ///
    /// `ttl = None` keeps the entry until it is evicted.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Cache name for logging
    fn name(&self) -> &'static str;
}
