//! Fixture backend for offline use
//!
//! Answers store requests from a JSON document of per-scope metric points and
//! per-anchor cohort counts. Useful for local development, demos, and tests.
//!
//! # File Format
//!
//! ```json
//! {
//!   "series": [
//!     { "scope": "game-a", "metric": "active_users",
//!       "points": [{ "timestamp": "2024-01-01T00:00:00Z", "value": 120 }] }
//!   ],
//!   "cohorts": [
//!     { "scope": "game-a", "anchor": "2024-01-01", "offsets": { "0": 40, "1": 18 } }
//!   ]
//! }
//! ```
//!
//! A fixture tagged with `segments` only answers requests whose segments are
//! all in its tag list. Branch and environment filters are not modelled.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::backend::QueryBackend;
use crate::error::QueryError;
use crate::request::{StoreMetric, StoreRequest};
use crate::result::{Column, DATE_COLUMN, DataType, OFFSET_COLUMN, QueryResult, VALUE_COLUMN};

/// Fixture document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureData {
    /// Time-stamped metric points
    #[serde(default)]
    pub series: Vec<SeriesFixture>,
    /// Cohort counts by anchor day
    #[serde(default)]
    pub cohorts: Vec<CohortFixture>,
}

/// Raw points of one metric for one scope
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesFixture {
    /// Store scope key
    pub scope: String,
    /// Metric these points belong to
    pub metric: StoreMetric,
    /// Segments this fixture represents (empty = everyone)
    #[serde(default)]
    pub segments: Vec<String>,
    /// Points, at any resolution
    pub points: Vec<FixturePoint>,
}

/// A single raw point
#[derive(Debug, Clone, Deserialize)]
pub struct FixturePoint {
    /// Event time
    pub timestamp: DateTime<Utc>,
    /// Value at that time
    pub value: f64,
}

/// Retained players of the cohort first seen on `anchor`
#[derive(Debug, Clone, Deserialize)]
pub struct CohortFixture {
    /// Store scope key
    pub scope: String,
    /// Cohort anchor day
    pub anchor: NaiveDate,
    /// Segments this fixture represents (empty = everyone)
    #[serde(default)]
    pub segments: Vec<String>,
    /// Day offset from `anchor` to retained player count
    pub offsets: BTreeMap<u32, u64>,
}

/// Store backend answering from in-memory fixtures
#[derive(Debug, Clone, Default)]
pub struct FixtureBackend {
    data: FixtureData,
}

impl FixtureBackend {
    /// Create from parsed fixture data
    pub fn new(data: FixtureData) -> Self {
        Self { data }
    }

    /// Load fixtures from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("failed to read fixture '{}': {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse fixtures from a JSON string
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        let data: FixtureData = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }

    fn series_rows(&self, request: &StoreRequest) -> Vec<Vec<serde_json::Value>> {
        let window = &request.window;
        let mut buckets: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();

        let fixtures = self.data.series.iter().filter(|f| {
            f.scope == request.scope
                && f.metric == request.metric
                && covers_segments(&f.segments, &request.filters.segments)
        });

        for fixture in fixtures {
            for point in &fixture.points {
                if point.timestamp < window.start || point.timestamp > window.end {
                    continue;
                }
                let bucket = window.granularity.truncate(point.timestamp);
                *buckets.entry(bucket).or_insert(0.0) += point.value;
            }
        }

        buckets
            .into_iter()
            .map(|(ts, value)| vec![serde_json::json!(ts.to_rfc3339()), serde_json::json!(value)])
            .collect()
    }

    fn cohort_rows(&self, request: &StoreRequest) -> Vec<Vec<serde_json::Value>> {
        let anchor = request.window.start.date_naive();
        let last_day = request.window.end.date_naive();
        let max_offset = (last_day - anchor).num_days().max(0) as u32;

        let mut offsets: BTreeMap<u32, u64> = BTreeMap::new();
        let fixtures = self.data.cohorts.iter().filter(|c| {
            c.scope == request.scope
                && c.anchor == anchor
                && covers_segments(&c.segments, &request.filters.segments)
        });

        for cohort in fixtures {
            for (&offset, &count) in cohort.offsets.range(..=max_offset) {
                *offsets.entry(offset).or_insert(0) += count;
            }
        }

        offsets
            .into_iter()
            .map(|(offset, count)| vec![serde_json::json!(offset), serde_json::json!(count)])
            .collect()
    }
}

/// A fixture answers a request if it carries every requested segment
fn covers_segments(tags: &[String], requested: &[String]) -> bool {
    requested.iter().all(|s| tags.contains(s))
}

#[async_trait]
impl QueryBackend for FixtureBackend {
    async fn execute(&self, request: &StoreRequest) -> Result<QueryResult, QueryError> {
        let start = Instant::now();

        let (columns, rows) = if request.metric.is_cohort() {
            (
                vec![
                    Column::new(OFFSET_COLUMN, DataType::UInt64, false),
                    Column::new(VALUE_COLUMN, DataType::UInt64, false),
                ],
                self.cohort_rows(request),
            )
        } else {
            (
                vec![
                    Column::new(DATE_COLUMN, DataType::String, false),
                    Column::new(VALUE_COLUMN, DataType::Float64, false),
                ],
                self.series_rows(request),
            )
        };

        let result = QueryResult::new(columns, rows, start.elapsed().as_millis() as u64);

        tracing::debug!(
            scope = %request.scope,
            metric = %request.metric,
            rows = result.row_count,
            "fixture query executed"
        );

        Ok(result)
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
#[path = "fixture_test.rs"]
mod fixture_test;
