//! Tests for entity fan-out and rollup folding

use std::sync::Arc;
use std::time::Duration;

use beacon_config::EngineConfig;
use beacon_query::{FixtureData, StoreMetric};

use crate::aggregator::QueryPlan;
use crate::filter::{EntityScope, RollupRequest};
use crate::scope::{IdentityResolver, MapResolver};
use crate::test_support::{ScriptedBackend, cohort, daily, engine, engine_with, week};
use crate::timeseries::{RollupStatus, TimelineRow};

/// Game A: dau 1..7 this week and 1/day the week before. Game B: alternating 0/1.
fn two_games() -> FixtureData {
    FixtureData {
        series: vec![
            daily("game-a", StoreMetric::ActiveUsers, "2024-01-01", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]),
            daily("game-a", StoreMetric::ActiveUsers, "2023-12-25", &[1.0; 7]),
            daily("game-a", StoreMetric::NewUsers, "2024-01-01", &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
            daily("game-a", StoreMetric::Revenue, "2024-01-01", &[9.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5]),
            daily("game-a", StoreMetric::Revenue, "2023-12-25", &[2.0; 7]),
            daily("game-b", StoreMetric::ActiveUsers, "2024-01-01", &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]),
        ],
        cohorts: vec![
            cohort("game-a", "2024-01-01", &[(0, 4), (1, 2)]),
            cohort("game-b", "2024-01-02", &[(0, 3)]),
        ],
    }
}

fn both() -> RollupRequest {
    RollupRequest::new(
        EntityScope::Many(vec!["game-a".into(), "game-b".into()]),
        week(),
    )
}

fn dau(rows: &[TimelineRow]) -> Vec<f64> {
    rows.iter().map(|r| r.dau).collect()
}

#[tokio::test]
async fn test_overall_series_is_bucket_sum() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let result = engine(backend).rollup(&both(), &IdentityResolver).await.unwrap();

    assert_eq!(result.status, RollupStatus::Complete);
    assert_eq!(result.per_entity.len(), 2);
    assert_eq!(result.per_entity[0].entity_id, "game-a");
    assert_eq!(result.per_entity[1].entity_id, "game-b");
    assert_eq!(dau(&result.overall_series), vec![1.0, 3.0, 3.0, 5.0, 5.0, 7.0, 7.0]);
    assert_eq!(result.overall_series.len(), 7);

    let retention: Vec<u64> = result.overall_series.iter().map(|r| r.retention).collect();
    assert_eq!(retention, vec![7, 2, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn test_deltas() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let result = engine(backend).rollup(&both(), &IdentityResolver).await.unwrap();

    let a = &result.per_entity[0];
    assert_eq!(a.delta.dau, 28.0 - 7.0);
    assert_eq!(a.delta.new_users, 2.0);
    assert_eq!(a.delta.revenue, 10.0 - 14.0);
    assert_eq!(a.comparison.dau.previous_total, 7.0);
    assert_eq!(a.comparison.dau.percent_change, 300.0);

    let b = &result.per_entity[1];
    assert_eq!(b.delta.dau, 3.0);
    assert_eq!(b.comparison.dau.percent_change, 100.0);

    assert_eq!(result.overall_delta.delta_dau, 24.0);
    assert_eq!(result.overall_delta.delta_new_users, 2.0);
    assert_eq!(result.overall_delta.delta_revenue, -4.0);
}

#[tokio::test]
async fn test_unknown_entity_is_isolated() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let resolver = MapResolver::new()
        .with("game-a", "game-a")
        .with("game-b", "game-b");
    let request = RollupRequest::new(
        EntityScope::Many(vec!["game-a".into(), "ghost".into(), "game-b".into()]),
        week(),
    );

    let result = engine(backend).rollup(&request, &resolver).await.unwrap();

    assert_eq!(result.status, RollupStatus::Degraded);
    assert_eq!(result.failed_entities, vec!["ghost"]);
    let ghost = &result.per_entity[1];
    assert!(ghost.degraded);
    assert_eq!(ghost.series.len(), 7);
    assert!(ghost.series.iter().all(|r| r.dau == 0.0));
    assert_eq!(dau(&result.overall_series), vec![1.0, 3.0, 3.0, 5.0, 5.0, 7.0, 7.0]);
}

#[tokio::test]
async fn test_failed_metric_is_zero_filled() {
    let backend = Arc::new(
        ScriptedBackend::new(two_games())
            .failing_when(|r| r.scope == "game-a" && r.metric == StoreMetric::Revenue),
    );
    let result = engine(backend).rollup(&both(), &IdentityResolver).await.unwrap();

    let a = &result.per_entity[0];
    assert!(a.degraded);
    assert_eq!(a.errors.len(), 2);
    assert!(a.errors.iter().all(|e| e.starts_with("revenue")));
    assert!(a.series.iter().all(|r| r.revenue == 0.0));
    assert_eq!(a.series[6].dau, 7.0);
    assert_eq!(a.delta.revenue, 0.0);

    assert!(!result.per_entity[1].degraded);
    assert_eq!(result.failed_entities, vec!["game-a"]);
}

#[tokio::test]
async fn test_request_count_per_entity() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let request = RollupRequest::new("game-a", week());
    engine(backend.clone()).rollup(&request, &IdentityResolver).await.unwrap();

    // 3 series x 2 periods + one cohort per day
    assert_eq!(backend.calls(), 6 + 7);
    assert_eq!(backend.calls_for(StoreMetric::ActiveUsers), 2);
    assert_eq!(backend.calls_for(StoreMetric::Retention), 7);
}

#[tokio::test]
async fn test_identical_requests_hit_cache() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let engine = engine(backend.clone());

    let first = engine.rollup(&both(), &IdentityResolver).await.unwrap();
    let calls = backend.calls();
    let second = engine.rollup(&both(), &IdentityResolver).await.unwrap();

    assert_eq!(backend.calls(), calls);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_force_refresh_requeries() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let engine = engine(backend.clone());

    engine.rollup(&both(), &IdentityResolver).await.unwrap();
    let calls = backend.calls();
    engine
        .rollup(&both().with_force_refresh(true), &IdentityResolver)
        .await
        .unwrap();

    assert_eq!(backend.calls(), calls * 2);
}

#[tokio::test]
async fn test_segment_filter_changes_fingerprint() {
    let backend = Arc::new(ScriptedBackend::new(two_games()));
    let engine = engine(backend.clone());

    engine.rollup(&both(), &IdentityResolver).await.unwrap();
    let calls = backend.calls();
    let result = engine
        .rollup(&both().with_segments(["whales"]), &IdentityResolver)
        .await
        .unwrap();

    assert_eq!(backend.calls(), calls * 2);
    // no fixture is tagged "whales"
    assert!(result.overall_series.iter().all(|r| r.dau == 0.0));
    assert!(backend.requests().iter().any(|r| r.filters.segments == vec!["whales"]));
}

#[tokio::test]
async fn test_store_calls_are_bounded() {
    let backend = Arc::new(
        ScriptedBackend::new(two_games()).with_delay(Duration::from_millis(5)),
    );
    let engine = engine_with(
        backend.clone(),
        EngineConfig::default().with_max_concurrent_queries(2),
    );

    engine.rollup(&both(), &IdentityResolver).await.unwrap();

    assert_eq!(backend.calls(), 2 * (6 + 7));
    assert!(backend.max_in_flight() <= 2);
}

#[test]
fn test_plan_shares_granularity() {
    let plan = QueryPlan::new(&week()).unwrap();
    assert_eq!(plan.current.granularity, plan.past.granularity);
    assert_eq!(plan.skeleton().len(), 7);
    assert!(plan.past.end < plan.current.start);
}
