//! Tests for the metric query cache

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use beacon_cache::{CacheError, CacheStore, MemoryCache};
use beacon_config::CacheConfig;
use beacon_query::{Granularity, RequestFilters, StoreMetric, StoreRequest, Window};

use crate::cache::MetricQueryCache;
use crate::clock::FixedClock;
use crate::error::AnalyticsError;
use crate::test_support::ts;

struct BrokenCache;

#[async_trait]
impl CacheStore for BrokenCache {
    async fn get(&self, _key: &str) -> beacon_cache::Result<Option<String>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> beacon_cache::Result<()> {
        Err(CacheError::Write("read-only".into()))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

fn request(segments: &[&str]) -> StoreRequest {
    StoreRequest::new(
        "game-a",
        StoreMetric::ActiveUsers,
        Window {
            start: ts("2024-01-01T00:00:00Z"),
            end: ts("2024-01-07T23:59:59Z"),
            granularity: Granularity::Day,
        },
        RequestFilters::new(segments.iter().copied()),
    )
}

fn ok<T>(value: T) -> crate::error::Result<T> {
    Ok(value)
}

fn config() -> CacheConfig {
    CacheConfig {
        capacity: 100,
        today_ttl: Duration::from_secs(60),
        historical_ttl: Duration::from_secs(3600),
    }
}

fn cache_over(store: Arc<dyn CacheStore>) -> MetricQueryCache {
    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap()));
    MetricQueryCache::new(store, clock, &config())
}

#[test]
fn test_fingerprint_is_canonical() {
    let a = MetricQueryCache::fingerprint(&request(&["whales", "new"])).unwrap();
    let b = MetricQueryCache::fingerprint(&request(&["new", "whales", "new"])).unwrap();
    assert_eq!(a, b);
    assert!(a.starts_with("beacon:metric:dau:"));
}

#[test]
fn test_fingerprint_distinguishes_requests() {
    let base = request(&[]);
    let mut other_metric = base.clone();
    other_metric.metric = StoreMetric::Revenue;
    let mut other_scope = base.clone();
    other_scope.scope = "game-b".into();

    let fp = |r: &StoreRequest| MetricQueryCache::fingerprint(r).unwrap();
    assert_ne!(fp(&base), fp(&other_metric));
    assert_ne!(fp(&base), fp(&other_scope));
    assert_ne!(fp(&base), fp(&request(&["whales"])));
}

#[test]
fn test_ttl_policy() {
    let cache = cache_over(Arc::new(MemoryCache::new(10)));

    // clock is 2024-01-07 12:00, so this window reaches today
    let today = request(&[]).window;
    assert_eq!(cache.ttl_for(&today), Duration::from_secs(60));

    let historical = Window {
        end: ts("2024-01-06T23:59:59Z"),
        ..today
    };
    assert_eq!(cache.ttl_for(&historical), Duration::from_secs(3600));
}

#[tokio::test]
async fn test_get_or_compute_caches() {
    let cache = cache_over(Arc::new(MemoryCache::new(10)));
    let computed = AtomicUsize::new(0);
    let compute = || async {
        computed.fetch_add(1, Ordering::SeqCst);
        ok(vec![1.0, 2.0])
    };

    let first: Vec<f64> = cache.get_or_compute(&request(&[]), false, compute).await.unwrap();
    let second: Vec<f64> = cache.get_or_compute(&request(&[]), false, compute).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(computed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_force_refresh_skips_read_but_writes() {
    let cache = cache_over(Arc::new(MemoryCache::new(10)));
    let req = request(&[]);

    let _: u32 = cache.get_or_compute(&req, false, || async { ok(1) }).await.unwrap();
    let refreshed: u32 = cache.get_or_compute(&req, true, || async { ok(2) }).await.unwrap();
    assert_eq!(refreshed, 2);
    assert_eq!(cache.refresh_count(), 1);

    // the refreshed value replaced the old entry
    let cached: u32 = cache.get_or_compute(&req, false, || async { ok(3) }).await.unwrap();
    assert_eq!(cached, 2);
}

#[tokio::test]
async fn test_failed_compute_is_not_cached() {
    let cache = cache_over(Arc::new(MemoryCache::new(10)));
    let req = request(&[]);

    let failed: crate::error::Result<u32> = cache
        .get_or_compute(&req, false, || async {
            Err(AnalyticsError::Unavailable("store down".into()))
        })
        .await;
    assert!(failed.is_err());

    let value: u32 = cache.get_or_compute(&req, false, || async { ok(7) }).await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn test_cache_errors_are_not_fatal() {
    let cache = cache_over(Arc::new(BrokenCache));
    let value: u32 = cache
        .get_or_compute(&request(&[]), false, || async { ok(42) })
        .await
        .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_undecodable_entry_is_a_miss() {
    let store = Arc::new(MemoryCache::new(10));
    let cache = cache_over(store.clone());
    let req = request(&[]);
    let key = MetricQueryCache::fingerprint(&req).unwrap();
    store.set(&key, "not json".into(), None).await.unwrap();

    let value: u32 = cache.get_or_compute(&req, false, || async { ok(5) }).await.unwrap();
    assert_eq!(value, 5);
    assert_eq!(cache.get::<u32>(&key).await, Some(5));
}
