//! Entity fan-out and rollup fold
//!
//! Each entity runs its own pipeline: resolve the store scope, fetch every
//! metric for the current and past interval concurrently, compute cohort
//! retention, align everything to the skeleton and derive deltas. A failure
//! anywhere in one entity's pipeline zero-fills what it affects and is
//! reported on that entity's timeline; it never aborts the rollup.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, warn};

use beacon_query::{RequestFilters, StoreMetric};

use crate::delta::{comparison, entity_delta};
use crate::error::Result;
use crate::interval::{DateFilter, Interval, Skeleton};
use crate::merge::{self, align, merge_timeline};
use crate::metrics::{CohortRetentionComputer, MetricFetcher};
use crate::scope::ScopeResolver;
use crate::timeseries::{
    EntityTimeline, MetricPoint, MetricSeries, OverallDelta, RetentionSeries, RollupResult,
    RollupStatus,
};

/// Store fetches per entity: three series for two periods plus retention
const FETCHES_PER_ENTITY: usize = 7;

/// Current and comparison intervals shared by every entity of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPlan {
    /// Requested interval
    pub current: Interval,
    /// Same-length interval immediately before it
    pub past: Interval,
}

impl QueryPlan {
    /// Resolve a date filter into a plan
    pub fn new(filter: &DateFilter) -> Result<Self> {
        let current = Interval::from_date_filter(filter)?;
        Ok(Self {
            past: current.past()?,
            current,
        })
    }

    /// Skeleton of the current interval
    pub fn skeleton(&self) -> Skeleton {
        self.current.timestamps()
    }
}

/// One entity's timeline and whether nothing at all could be computed for it
#[derive(Debug, Clone)]
pub struct EntityOutcome {
    /// The (possibly zero-filled) timeline
    pub timeline: EntityTimeline,
    /// Scope resolution failed or every fetch failed
    pub unavailable: bool,
}

/// Fans requests out over entities and folds their timelines
pub struct EntityAggregator {
    fetcher: Arc<MetricFetcher>,
    cohort_max_days: u32,
}

impl EntityAggregator {
    /// Create an aggregator
    pub fn new(fetcher: Arc<MetricFetcher>, cohort_max_days: u32) -> Self {
        Self {
            fetcher,
            cohort_max_days,
        }
    }

    /// Shared metric fetcher
    pub fn fetcher(&self) -> &MetricFetcher {
        &self.fetcher
    }

    /// Build the timeline of one entity
    pub async fn entity_timeline(
        &self,
        entity_id: &str,
        resolver: &dyn ScopeResolver,
        plan: &QueryPlan,
        filters: &RequestFilters,
        force_refresh: bool,
    ) -> EntityOutcome {
        let start = Instant::now();
        let skeleton = plan.skeleton();
        let past_skeleton = plan.past.timestamps();

        let scope = match resolver.resolve(entity_id).await {
            Ok(scope) => scope,
            Err(e) => {
                warn!(entity = entity_id, error = %e, "scope resolution failed");
                return EntityOutcome {
                    timeline: EntityTimeline::zeroed(entity_id, &skeleton, e.to_string()),
                    unavailable: true,
                };
            }
        };

        let fetcher = &self.fetcher;
        let cohorts = CohortRetentionComputer::new(fetcher, self.cohort_max_days);
        let (current, past) = (&plan.current, &plan.past);

        let (dau, dau_past, new_users, new_users_past, revenue, revenue_past, retention) = tokio::join!(
            fetcher.fetch_series(&scope, StoreMetric::ActiveUsers, current, filters, force_refresh),
            fetcher.fetch_series(&scope, StoreMetric::ActiveUsers, past, filters, force_refresh),
            fetcher.fetch_series(&scope, StoreMetric::NewUsers, current, filters, force_refresh),
            fetcher.fetch_series(&scope, StoreMetric::NewUsers, past, filters, force_refresh),
            fetcher.fetch_series(&scope, StoreMetric::Revenue, current, filters, force_refresh),
            fetcher.fetch_series(&scope, StoreMetric::Revenue, past, filters, force_refresh),
            cohorts.compute(&scope, current, filters, force_refresh),
        );

        let mut errors = Vec::new();
        let mut settle = |label: &str, result: Result<Vec<MetricPoint>>, skeleton: &Skeleton| {
            match result {
                Ok(rows) => align(skeleton, [rows.as_slice()]),
                Err(e) => {
                    warn!(entity = entity_id, scope = %scope, metric = label, error = %e, "metric fetch failed");
                    errors.push(format!("{}: {}", label, e));
                    MetricSeries::zeros(skeleton)
                }
            }
        };

        let dau = settle("dau", dau, &skeleton);
        let dau_past = settle("dau (past)", dau_past, &past_skeleton);
        let new_users = settle("new_users", new_users, &skeleton);
        let new_users_past = settle("new_users (past)", new_users_past, &past_skeleton);
        let revenue = settle("revenue", revenue, &skeleton);
        let revenue_past = settle("revenue (past)", revenue_past, &past_skeleton);

        let mut failed = errors.len();
        if let Some(failure) = &retention.failure {
            errors.push(format!(
                "retention: anchor {} failed: {}",
                failure.anchor, failure.error
            ));
            if retention.is_unavailable() {
                failed += 1;
            }
        }

        let current_rows = merge_timeline(&skeleton, &dau, &new_users, &revenue, &retention.series);
        let past_rows = merge_timeline(
            &past_skeleton,
            &dau_past,
            &new_users_past,
            &revenue_past,
            &RetentionSeries::zeros(&past_skeleton),
        );

        debug!(
            entity = entity_id,
            scope = %scope,
            buckets = skeleton.len(),
            errors = errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "entity timeline computed"
        );

        EntityOutcome {
            timeline: EntityTimeline {
                entity_id: entity_id.to_string(),
                delta: entity_delta(&current_rows, &past_rows),
                comparison: comparison(&current_rows, &past_rows),
                series: current_rows,
                degraded: !errors.is_empty(),
                errors,
            },
            unavailable: failed == FETCHES_PER_ENTITY,
        }
    }

    /// Run every entity pipeline concurrently, in request order
    pub async fn collect(
        &self,
        entity_ids: &[String],
        resolver: &dyn ScopeResolver,
        plan: &QueryPlan,
        filters: &RequestFilters,
        force_refresh: bool,
    ) -> Vec<EntityOutcome> {
        join_all(
            entity_ids
                .iter()
                .map(|id| self.entity_timeline(id, resolver, plan, filters, force_refresh)),
        )
        .await
    }

    /// Sum entity timelines and deltas into a rollup
    pub fn fold(plan: &QueryPlan, outcomes: Vec<EntityOutcome>) -> RollupResult {
        let skeleton = plan.skeleton();
        let per_entity: Vec<EntityTimeline> = outcomes.into_iter().map(|o| o.timeline).collect();

        let overall_series = merge::fold(&skeleton, per_entity.iter().map(|t| t.series.as_slice()));
        let mut overall_delta = OverallDelta::default();
        for timeline in &per_entity {
            overall_delta.accumulate(&timeline.delta);
        }

        let failed_entities: Vec<String> = per_entity
            .iter()
            .filter(|t| t.degraded)
            .map(|t| t.entity_id.clone())
            .collect();
        let status = if failed_entities.is_empty() {
            RollupStatus::Complete
        } else {
            RollupStatus::Degraded
        };

        RollupResult {
            overall_series,
            per_entity,
            overall_delta,
            status,
            failed_entities,
        }
    }

    /// Collect and fold in one step
    pub async fn rollup(
        &self,
        entity_ids: &[String],
        resolver: &dyn ScopeResolver,
        plan: &QueryPlan,
        filters: &RequestFilters,
        force_refresh: bool,
    ) -> RollupResult {
        let outcomes = self
            .collect(entity_ids, resolver, plan, filters, force_refresh)
            .await;
        Self::fold(plan, outcomes)
    }
}
