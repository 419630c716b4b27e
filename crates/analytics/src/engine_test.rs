//! Tests for the engine entry points

use std::sync::Arc;
use std::time::Duration;

use beacon_config::EngineConfig;
use beacon_query::{FixtureData, StoreMetric};

use crate::error::AnalyticsError;
use crate::filter::{EntityScope, RollupRequest};
use crate::interval::DateFilter;
use crate::scope::{IdentityResolver, MapResolver};
use crate::test_support::{ScriptedBackend, cohort, daily, engine, engine_with, ts, week};
use crate::timeseries::RollupStatus;

fn one_game() -> FixtureData {
    FixtureData {
        series: vec![daily(
            "game-a",
            StoreMetric::ActiveUsers,
            "2024-01-01",
            &[5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0],
        )],
        cohorts: (1..=7)
            .map(|d| cohort("game-a", &format!("2024-01-0{}", d), &[(0, 10), (1, 4)]))
            .collect(),
    }
}

#[tokio::test]
async fn test_invalid_interval_is_rejected_before_querying() {
    let backend = Arc::new(ScriptedBackend::new(one_game()));
    let engine = engine(backend.clone());
    let request = RollupRequest::new(
        "game-a",
        DateFilter::range(ts("2024-01-07T00:00:00Z"), ts("2024-01-01T00:00:00Z")),
    );

    let result = engine.rollup(&request, &IdentityResolver).await;
    assert!(matches!(result, Err(AnalyticsError::InvalidInterval(_))));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_total_failure_is_unavailable() {
    let backend = Arc::new(ScriptedBackend::new(one_game()).failing_when(|_| true));
    let request = RollupRequest::new(
        EntityScope::Many(vec!["game-a".into(), "game-b".into()]),
        week(),
    );

    let result = engine(backend).rollup(&request, &IdentityResolver).await;
    match result {
        Err(AnalyticsError::Unavailable(reason)) => assert!(reason.contains("scripted failure")),
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_partial_failure_still_returns() {
    let backend = Arc::new(
        ScriptedBackend::new(one_game()).failing_when(|r| r.scope == "game-b"),
    );
    let request = RollupRequest::new(
        EntityScope::Many(vec!["game-a".into(), "game-b".into()]),
        week(),
    );

    let result = engine(backend).rollup(&request, &IdentityResolver).await.unwrap();
    assert_eq!(result.status, RollupStatus::Degraded);
    assert_eq!(result.failed_entities, vec!["game-b"]);
    assert_eq!(result.overall_series[0].dau, 5.0);
}

#[tokio::test]
async fn test_empty_entity_list() {
    let backend = Arc::new(ScriptedBackend::new(one_game()));
    let request = RollupRequest::new(EntityScope::Many(Vec::new()), week());

    let result = engine(backend.clone()).rollup(&request, &IdentityResolver).await.unwrap();
    assert_eq!(result.status, RollupStatus::Complete);
    assert!(result.per_entity.is_empty());
    assert_eq!(result.overall_series.len(), 7);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_timeout_cancels_outstanding_queries() {
    let backend = Arc::new(
        ScriptedBackend::new(one_game()).with_delay(Duration::from_millis(500)),
    );
    let engine = engine_with(
        backend,
        EngineConfig::default().with_request_timeout(Duration::from_millis(20)),
    );

    let result = engine
        .rollup(&RollupRequest::new("game-a", week()), &IdentityResolver)
        .await;
    assert!(matches!(result, Err(AnalyticsError::Timeout(d)) if d == Duration::from_millis(20)));
}

#[tokio::test]
async fn test_timeline() {
    let backend = Arc::new(ScriptedBackend::new(one_game()));
    let timeline = engine(backend)
        .timeline(&RollupRequest::new("game-a", week()), &IdentityResolver)
        .await
        .unwrap();

    assert_eq!(timeline.entity_id, "game-a");
    assert!(!timeline.degraded);
    assert_eq!(timeline.series.len(), 7);
    assert_eq!(timeline.delta.dau, 35.0);
    // seven cohorts of 10; six of them have a day 1 inside the week
    assert_eq!(timeline.series[0].retention, 70);
    assert_eq!(timeline.series[1].retention, 24);
    assert_eq!(timeline.series[3].retention, 0);
}

#[tokio::test]
async fn test_timeline_unknown_entity_fails() {
    let backend = Arc::new(ScriptedBackend::new(one_game()));
    let result = engine(backend)
        .timeline(&RollupRequest::new("ghost", week()), &MapResolver::new())
        .await;

    assert!(matches!(result, Err(AnalyticsError::Unavailable(_))));
}

#[tokio::test]
async fn test_retention_report() {
    let backend = Arc::new(ScriptedBackend::new(one_game()));
    let report = engine(backend)
        .retention(&RollupRequest::new("game-a", week()), &IdentityResolver)
        .await
        .unwrap();

    assert!(!report.degraded);
    assert_eq!(report.series.len(), 7);
    assert_eq!(report.series.percentages()[0], "100%");
    assert_eq!(report.series.percentages()[1], "34%");
}

#[tokio::test]
async fn test_retention_report_degraded() {
    let backend = Arc::new(
        ScriptedBackend::new(one_game())
            .failing_when(|r| r.window.start == ts("2024-01-05T00:00:00Z")),
    );
    let report = engine(backend)
        .retention(&RollupRequest::new("game-a", week()), &IdentityResolver)
        .await
        .unwrap();

    assert!(report.degraded);
    assert!(report.error.unwrap().contains("2024-01-05"));
    assert_eq!(report.series.value_at(0), 40);
    assert_eq!(report.series.value_at(1), 16);
    assert_eq!(report.series.value_at(4), 0);
}

#[tokio::test]
async fn test_retention_first_anchor_failure_is_degraded() {
    let backend = Arc::new(
        ScriptedBackend::new(one_game())
            .failing_when(|r| r.window.start == ts("2024-01-01T00:00:00Z")),
    );
    let report = engine(backend)
        .retention(&RollupRequest::new("game-a", week()), &IdentityResolver)
        .await
        .unwrap();

    assert!(report.degraded);
    assert!(report.error.unwrap().contains("2024-01-01"));
    assert_eq!(report.series.len(), 7);
    assert!(report.series.points.iter().all(|p| p.retention == 0));
}

#[tokio::test]
async fn test_retention_every_anchor_failing_is_unavailable() {
    let backend = Arc::new(
        ScriptedBackend::new(one_game()).failing_when(|r| r.metric == StoreMetric::Retention),
    );
    let result = engine(backend)
        .retention(&RollupRequest::new("game-a", week()), &IdentityResolver)
        .await;

    assert!(matches!(result, Err(AnalyticsError::Unavailable(_))));
}

#[tokio::test]
async fn test_health_check() {
    let backend = Arc::new(ScriptedBackend::new(FixtureData::default()));
    let engine = engine(backend);

    assert!(engine.health_check().await.is_ok());
    assert_eq!(engine.backend_name(), "scripted");
}
