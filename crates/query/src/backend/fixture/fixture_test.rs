//! Tests for the fixture backend

use std::io::Write;

use chrono::TimeZone;

use super::*;
use crate::request::{Granularity, RequestFilters, Window};

const FIXTURE: &str = r#"{
  "series": [
    { "scope": "game-a", "metric": "active_users", "points": [
      { "timestamp": "2024-01-01T03:00:00Z", "value": 2 },
      { "timestamp": "2024-01-01T15:00:00Z", "value": 3 },
      { "timestamp": "2024-01-03T10:00:00Z", "value": 4 },
      { "timestamp": "2024-01-09T10:00:00Z", "value": 100 }
    ]},
    { "scope": "game-a", "metric": "active_users", "segments": ["whales"], "points": [
      { "timestamp": "2024-01-02T00:00:00Z", "value": 1 }
    ]},
    { "scope": "game-b", "metric": "revenue", "points": [
      { "timestamp": "2024-01-01T00:00:00Z", "value": 9.5 }
    ]}
  ],
  "cohorts": [
    { "scope": "game-a", "anchor": "2024-01-01", "offsets": { "0": 10, "1": 6, "5": 2, "9": 1 } },
    { "scope": "game-a", "anchor": "2024-01-02", "offsets": { "0": 8 } }
  ]
}"#;

fn request(metric: StoreMetric, granularity: Granularity, segments: &[&str]) -> StoreRequest {
    StoreRequest::new(
        "game-a",
        metric,
        Window {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 7, 23, 59, 59).unwrap(),
            granularity,
        },
        RequestFilters::new(segments.iter().copied()),
    )
}

#[tokio::test]
async fn test_series_buckets_by_day() {
    let backend = FixtureBackend::from_json(FIXTURE).unwrap();
    let result = backend
        .execute(&request(StoreMetric::ActiveUsers, Granularity::Day, &[]))
        .await
        .unwrap();

    // Jan 1 (2+3), Jan 2 (segment fixture also matches unsegmented requests), Jan 3.
    // Jan 9 is outside the window.
    assert_eq!(result.row_count, 3);
    assert_eq!(result.rows[0][1], serde_json::json!(5.0));
    assert_eq!(result.rows[1][1], serde_json::json!(1.0));
    assert_eq!(result.rows[2][1], serde_json::json!(4.0));
}

#[tokio::test]
async fn test_series_buckets_by_hour() {
    let backend = FixtureBackend::from_json(FIXTURE).unwrap();
    let result = backend
        .execute(&request(StoreMetric::ActiveUsers, Granularity::Hour, &[]))
        .await
        .unwrap();
    assert_eq!(result.row_count, 4);
}

#[tokio::test]
async fn test_segment_filter() {
    let backend = FixtureBackend::from_json(FIXTURE).unwrap();
    let result = backend
        .execute(&request(StoreMetric::ActiveUsers, Granularity::Day, &["whales"]))
        .await
        .unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][1], serde_json::json!(1.0));
}

#[tokio::test]
async fn test_unknown_scope_is_empty() {
    let backend = FixtureBackend::from_json(FIXTURE).unwrap();
    let mut req = request(StoreMetric::Revenue, Granularity::Day, &[]);
    req.scope = "game-z".into();
    let result = backend.execute(&req).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_cohort_rows_clipped_to_window() {
    let backend = FixtureBackend::from_json(FIXTURE).unwrap();
    let result = backend
        .execute(&request(StoreMetric::Retention, Granularity::Day, &[]))
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["offset", "value"]);
    // offset 9 is past Jan 7
    assert_eq!(result.row_count, 3);
    assert_eq!(result.rows[0], vec![serde_json::json!(0), serde_json::json!(10)]);
    assert_eq!(result.rows[2], vec![serde_json::json!(5), serde_json::json!(2)]);
}

#[tokio::test]
async fn test_cohort_matches_anchor_day() {
    let backend = FixtureBackend::from_json(FIXTURE).unwrap();
    let mut req = request(StoreMetric::Retention, Granularity::Day, &[]);
    req.window.start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let result = backend.execute(&req).await.unwrap();
    assert_eq!(result.rows, vec![vec![serde_json::json!(0), serde_json::json!(8)]]);
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE.as_bytes()).unwrap();
    let backend = FixtureBackend::from_file(file.path()).unwrap();
    assert_eq!(backend.name(), "fixture");
    assert_eq!(backend.data.series.len(), 3);
}

#[test]
fn test_from_missing_file() {
    let result = FixtureBackend::from_file("/nonexistent/fixture.json");
    assert!(matches!(result, Err(QueryError::Config(_))));
}

#[test]
fn test_invalid_json() {
    let result = FixtureBackend::from_json("{\"series\": 5}");
    assert!(matches!(result, Err(QueryError::Serialization(_))));
}
