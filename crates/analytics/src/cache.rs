//! Metric query cache
//!
//! Wraps a [`CacheStore`] with request fingerprinting, a TTL policy and
//! typed values. Cache failures never fail a query: a read error is a miss
//! and a write error leaves the entry unwritten.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_128;

use beacon_cache::CacheStore;
use beacon_config::CacheConfig;
use beacon_query::{StoreRequest, Window};

use crate::clock::Clock;
use crate::error::Result;
use crate::interval::start_of_day;

/// Key prefix of every metric entry
const KEY_PREFIX: &str = "beacon:metric";

/// Fingerprinted, TTL-aware cache of metric query results
pub struct MetricQueryCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    today_ttl: Duration,
    historical_ttl: Duration,
    refreshes: AtomicU64,
}

impl MetricQueryCache {
    /// Create a cache over the given store
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        Self {
            store,
            clock,
            today_ttl: config.today_ttl,
            historical_ttl: config.historical_ttl,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Cache key of a request
    ///
    /// Hash of the canonical serialization, so two requests share a key
    /// exactly when they are equal.
    pub fn fingerprint(request: &StoreRequest) -> Result<String> {
        let canonical = request.canonical()?;
        Ok(format!(
            "{}:{}:{:032x}",
            KEY_PREFIX,
            request.metric,
            xxh3_128(canonical.as_bytes())
        ))
    }

    /// TTL for an entry covering `window`
    ///
    /// Windows reaching into the current day may still change.
    pub fn ttl_for(&self, window: &Window) -> Duration {
        let today = start_of_day(self.clock.now().date_naive());
        if window.end >= today {
            self.today_ttl
        } else {
            self.historical_ttl
        }
    }

    /// Number of reads skipped because of force refresh
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Typed lookup; errors and undecodable entries read as a miss
    pub async fn get<T: DeserializeOwned>(&self, fingerprint: &str) -> Option<T> {
        let raw = match self.store.get(fingerprint).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(cache = self.store.name(), key = fingerprint, error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = fingerprint, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Typed write; errors are logged and swallowed
    pub async fn set<T: Serialize>(&self, fingerprint: &str, value: &T, window: &Window) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = fingerprint, error = %e, "cannot serialize cache entry");
                return;
            }
        };

        let ttl = self.ttl_for(window);
        if let Err(e) = self.store.set(fingerprint, raw, Some(ttl)).await {
            warn!(cache = self.store.name(), key = fingerprint, error = %e, "cache write failed");
        }
    }

    /// Return the cached result of `request`, or compute and store it
    ///
    /// `force_refresh` skips the read but still writes the fresh value.
    /// Failed computations are not cached.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        request: &StoreRequest,
        force_refresh: bool,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let fingerprint = Self::fingerprint(request)?;

        if force_refresh {
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        } else if let Some(hit) = self.get(&fingerprint).await {
            debug!(key = %fingerprint, scope = %request.scope, "metric cache hit");
            return Ok(hit);
        }

        let value = compute().await?;
        self.set(&fingerprint, &value, &request.window).await;
        Ok(value)
    }
}
