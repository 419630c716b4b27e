//! In-process TTL cache
//!
//! Lock-free concurrent access through `DashMap`. When full, expired entries
//! are dropped first, then the oldest entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::CacheStore;

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups that returned a value
    pub hits: AtomicU64,

    /// Lookups that found nothing (or an expired entry)
    pub misses: AtomicU64,

    /// Successful writes
    pub writes: AtomicU64,

    /// Entries removed by expiry or capacity pressure
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Get hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// A cached value
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.ttl
            .is_some_and(|ttl| self.created_at.elapsed() > ttl)
    }
}

/// In-process cache with per-entry TTL
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    stats: CacheStats,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of entries currently stored (including expired, not yet evicted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove expired entries; returns how many were removed
    ///
    /// Call periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let evicted = before.saturating_sub(self.entries.len());
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.evict_if_expired(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove `key` only if the entry stored now is expired
    ///
    /// A concurrent `set` may have replaced the entry after it was seen
    /// expired; the fresh value stays.
    fn evict_if_expired(&self, key: &str) -> bool {
        let evicted = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired())
            .is_some();
        if evicted {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        evicted
    }

    fn make_room(&self) {
        if self.entries.len() < self.capacity {
            return;
        }

        if self.evict_expired() > 0 && self.entries.len() < self.capacity {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().created_at)
            .map(|e| (e.key().clone(), e.value().created_at));

        if let Some((key, created_at)) = oldest
            && self
                .entries
                .remove_if(&key, |_, entry| entry.created_at == created_at)
                .is_some()
        {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "evicted oldest cache entry");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.lookup(key);
        if value.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        if !self.entries.contains_key(key) {
            self.make_room();
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
