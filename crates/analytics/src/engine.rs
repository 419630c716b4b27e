//! Analytics engine
//!
//! Entry point wiring the store, cache and clock collaborators into the
//! aggregation pipeline. Every call runs under the configured request
//! timeout; when it fires, all outstanding sub-queries are dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, info, info_span, warn};

use beacon_cache::CacheStore;
use beacon_config::{CacheConfig, EngineConfig};
use beacon_query::QueryBackend;

use crate::aggregator::{EntityAggregator, EntityOutcome, QueryPlan};
use crate::cache::MetricQueryCache;
use crate::clock::Clock;
use crate::error::{AnalyticsError, Result};
use crate::filter::RollupRequest;
use crate::metrics::{CohortRetentionComputer, MetricFetcher};
use crate::scope::ScopeResolver;
use crate::timeseries::{EntityTimeline, RetentionReport, RollupResult, RollupStatus};

/// Aggregation engine over injected collaborators
pub struct AnalyticsEngine {
    aggregator: EntityAggregator,
    fetcher: Arc<MetricFetcher>,
    clock: Arc<dyn Clock>,
    cohort_max_days: u32,
    request_timeout: Duration,
}

impl AnalyticsEngine {
    /// Create an engine
    pub fn new(
        store: Arc<dyn QueryBackend>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        cache_config: &CacheConfig,
        config: &EngineConfig,
    ) -> Self {
        let metric_cache = MetricQueryCache::new(cache, Arc::clone(&clock), cache_config);
        let fetcher = Arc::new(MetricFetcher::new(
            store,
            metric_cache,
            config.max_concurrent_queries,
        ));

        Self {
            aggregator: EntityAggregator::new(Arc::clone(&fetcher), config.cohort_max_days),
            fetcher,
            clock,
            cohort_max_days: config.cohort_max_days,
            request_timeout: config.request_timeout,
        }
    }

    /// Time source used for relative filters and cache TTLs
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Metric cache (for stats)
    pub fn cache(&self) -> &MetricQueryCache {
        self.fetcher.cache()
    }

    /// Store backend name
    pub fn backend_name(&self) -> &'static str {
        self.fetcher.backend_name()
    }

    /// Roll up every entity of the request
    ///
    /// Partial failures are reported inside the result. Fails only when the
    /// interval is invalid, the timeout fires, or no entity could be computed.
    pub async fn rollup(
        &self,
        request: &RollupRequest,
        resolver: &dyn ScopeResolver,
    ) -> Result<RollupResult> {
        let plan = QueryPlan::new(&request.date_filter)?;
        let entity_ids = request.entity_scope.ids();
        let filters = request.filters();

        let span = info_span!(
            "rollup",
            entities = entity_ids.len(),
            start = %plan.current.start,
            end = %plan.current.end,
            granularity = %plan.current.granularity,
        );

        self.with_timeout(
            async {
                let started = Instant::now();
                let outcomes = self
                    .aggregator
                    .collect(&entity_ids, resolver, &plan, &filters, request.force_refresh)
                    .await;
                ensure_available(&outcomes)?;

                let result = EntityAggregator::fold(&plan, outcomes);
                if result.status == RollupStatus::Degraded {
                    warn!(failed = ?result.failed_entities, "rollup degraded");
                }
                info!(
                    buckets = result.overall_series.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "rollup complete"
                );
                Ok(result)
            }
            .instrument(span),
        )
        .await
    }

    /// Timeline of a single entity
    ///
    /// With several entities in the request, the first one is used.
    pub async fn timeline(
        &self,
        request: &RollupRequest,
        resolver: &dyn ScopeResolver,
    ) -> Result<EntityTimeline> {
        let plan = QueryPlan::new(&request.date_filter)?;
        let entity_id = first_entity(request)?;
        let filters = request.filters();

        let span = info_span!("timeline", entity = %entity_id, granularity = %plan.current.granularity);

        self.with_timeout(
            async {
                let outcome = self
                    .aggregator
                    .entity_timeline(&entity_id, resolver, &plan, &filters, request.force_refresh)
                    .await;
                ensure_available(std::slice::from_ref(&outcome))?;

                if outcome.timeline.degraded {
                    warn!(errors = ?outcome.timeline.errors, "timeline degraded");
                }
                Ok(outcome.timeline)
            }
            .instrument(span),
        )
        .await
    }

    /// Cohort retention of a single entity
    ///
    /// A failed anchor zero-fills the series from that anchor on and marks the
    /// report degraded. Fails only when every anchor query failed.
    pub async fn retention(
        &self,
        request: &RollupRequest,
        resolver: &dyn ScopeResolver,
    ) -> Result<RetentionReport> {
        let plan = QueryPlan::new(&request.date_filter)?;
        let entity_id = first_entity(request)?;
        let filters = request.filters();

        let span = info_span!("retention", entity = %entity_id, days = plan.current.days());

        self.with_timeout(
            async {
                let scope = resolver.resolve(&entity_id).await?;
                let outcome = CohortRetentionComputer::new(&self.fetcher, self.cohort_max_days)
                    .compute(&scope, &plan.current, &filters, request.force_refresh)
                    .await;

                if outcome.is_unavailable() {
                    let reason = outcome
                        .failure
                        .map(|f| f.error)
                        .unwrap_or_else(|| "every cohort query failed".to_string());
                    return Err(AnalyticsError::Unavailable(reason));
                }
                if let Some(failure) = &outcome.failure {
                    warn!(anchor = %failure.anchor, "retention degraded");
                }

                Ok(RetentionReport {
                    entity_id: entity_id.clone(),
                    degraded: outcome.is_degraded(),
                    error: outcome
                        .failure
                        .map(|f| format!("anchor {} failed: {}", f.anchor, f.error)),
                    series: outcome.series,
                })
            }
            .instrument(span),
        )
        .await
    }

    /// Ping the store
    pub async fn health_check(&self) -> Result<()> {
        self.with_timeout(self.fetcher.health_check()).await
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.request_timeout, "request timed out; cancelling sub-queries");
                Err(AnalyticsError::Timeout(self.request_timeout))
            }
        }
    }
}

fn first_entity(request: &RollupRequest) -> Result<String> {
    request
        .entity_scope
        .ids()
        .into_iter()
        .next()
        .ok_or_else(|| AnalyticsError::Unavailable("no entity requested".to_string()))
}

/// Fail when there were entities and none of them produced anything
fn ensure_available(outcomes: &[EntityOutcome]) -> Result<()> {
    if outcomes.is_empty() || outcomes.iter().any(|o| !o.unavailable) {
        return Ok(());
    }
    let reason = outcomes
        .iter()
        .flat_map(|o| o.timeline.errors.first())
        .next()
        .cloned()
        .unwrap_or_else(|| "all entities failed".to_string());
    Err(AnalyticsError::Unavailable(reason))
}
