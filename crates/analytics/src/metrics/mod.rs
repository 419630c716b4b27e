//! Metric fetchers
//!
//! Every store call goes through [`MetricFetcher`]: the request is first
//! looked up in the [`MetricQueryCache`], and a miss is executed against the
//! store while holding a permit of the shared query pool. Parsed rows (not
//! aligned series) are what gets cached, so the same entry serves any
//! skeleton over the same window.

pub mod retention;

pub use retention::{CohortFailure, CohortRetentionComputer, RetentionOutcome};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use beacon_query::{
    DATE_COLUMN, OFFSET_COLUMN, QueryBackend, QueryResult, RequestFilters, StoreMetric,
    StoreRequest, VALUE_COLUMN, Window,
};

use crate::cache::MetricQueryCache;
use crate::error::{AnalyticsError, Result};
use crate::interval::Interval;
use crate::timeseries::MetricPoint;

/// Sparse day-offset → player count map of one cohort
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortCounts(pub BTreeMap<u32, u64>);

impl CohortCounts {
    /// Count at `offset` (absent offsets are 0)
    pub fn get(&self, offset: u32) -> u64 {
        self.0.get(&offset).copied().unwrap_or(0)
    }

    /// Iterate `(offset, count)` pairs in offset order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.0.iter().map(|(offset, count)| (*offset, *count))
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(u32, u64)> for CohortCounts {
    fn from_iter<I: IntoIterator<Item = (u32, u64)>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for (offset, count) in iter {
            *counts.entry(offset).or_insert(0) += count;
        }
        Self(counts)
    }
}

/// Cache-checked, concurrency-bounded access to the store
pub struct MetricFetcher {
    store: Arc<dyn QueryBackend>,
    cache: MetricQueryCache,
    permits: Arc<Semaphore>,
}

impl MetricFetcher {
    /// Create a fetcher allowing `max_concurrent_queries` store calls at once
    pub fn new(
        store: Arc<dyn QueryBackend>,
        cache: MetricQueryCache,
        max_concurrent_queries: usize,
    ) -> Self {
        Self {
            store,
            cache,
            permits: Arc::new(Semaphore::new(max_concurrent_queries.max(1))),
        }
    }

    /// The metric cache
    pub fn cache(&self) -> &MetricQueryCache {
        &self.cache
    }

    /// Raw rows of a time-series metric over an interval
    pub async fn fetch_series(
        &self,
        scope: &str,
        metric: StoreMetric,
        interval: &Interval,
        filters: &RequestFilters,
        force_refresh: bool,
    ) -> Result<Vec<MetricPoint>> {
        let request = StoreRequest::new(scope, metric, interval.window(), filters.clone());
        self.cache
            .get_or_compute(&request, force_refresh, || async {
                let result = self.query(&request).await?;
                Ok(parse_series(&result))
            })
            .await
    }

    /// Offsets of the cohort anchored at `window.start`
    pub async fn fetch_cohort(
        &self,
        scope: &str,
        window: Window,
        filters: &RequestFilters,
        force_refresh: bool,
    ) -> Result<CohortCounts> {
        let request = StoreRequest::new(scope, StoreMetric::Retention, window, filters.clone());
        self.cache
            .get_or_compute(&request, force_refresh, || async {
                let result = self.query(&request).await?;
                Ok(parse_cohort(&result))
            })
            .await
    }

    /// Ping the store
    pub async fn health_check(&self) -> Result<()> {
        Ok(self.store.health_check().await?)
    }

    /// Store backend name
    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    async fn query(&self, request: &StoreRequest) -> Result<QueryResult> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AnalyticsError::Unavailable(e.to_string()))?;

        let start = Instant::now();
        let result = self.store.execute(request).await?;
        debug!(
            backend = self.store.name(),
            scope = %request.scope,
            metric = %request.metric,
            rows = result.row_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "store query"
        );
        Ok(result)
    }
}

/// Parse `(date, value)` rows
///
/// Rows with an unreadable timestamp are skipped; unreadable values count as 0.
pub(crate) fn parse_series(result: &QueryResult) -> Vec<MetricPoint> {
    let date_idx = result.column_index(DATE_COLUMN).unwrap_or(0);
    let value_idx = result.column_index(VALUE_COLUMN).unwrap_or(1);

    let mut points = Vec::with_capacity(result.row_count);
    for row in &result.rows {
        let Some(timestamp) = row.get(date_idx).and_then(parse_timestamp) else {
            warn!(row = ?row, "skipping row without a readable timestamp");
            continue;
        };
        let value = row.get(value_idx).and_then(as_f64).unwrap_or(0.0);
        points.push(MetricPoint::new(timestamp, value));
    }
    points
}

/// Parse cohort rows
///
/// Accepts either `(offset, value)` rows or a single row of `d0, d1, ...`
/// columns.
pub(crate) fn parse_cohort(result: &QueryResult) -> CohortCounts {
    if let Some(offset_idx) = result.column_index(OFFSET_COLUMN) {
        let value_idx = result.column_index(VALUE_COLUMN).unwrap_or(1);
        return result
            .rows
            .iter()
            .filter_map(|row| {
                let offset = row.get(offset_idx).and_then(as_f64)?;
                if offset < 0.0 {
                    return None;
                }
                let count = row.get(value_idx).and_then(as_f64).unwrap_or(0.0);
                Some((offset as u32, count.max(0.0) as u64))
            })
            .collect();
    }

    let offsets: Vec<(usize, u32)> = result
        .columns
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.name.strip_prefix('d')?.parse().ok().map(|o| (i, o)))
        .collect();

    result
        .rows
        .iter()
        .flat_map(|row| {
            offsets.iter().map(move |(i, offset)| {
                let count = row.get(*i).and_then(as_f64).unwrap_or(0.0);
                (*offset, count.max(0.0) as u64)
            })
        })
        .collect()
}

/// Read a numeric cell; 64-bit integers may arrive quoted
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a timestamp cell (RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`)
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(crate::interval::start_of_day)
}
