//! Shared test doubles

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use beacon_cache::MemoryCache;
use beacon_config::{CacheConfig, EngineConfig};
use beacon_query::{
    CohortFixture, FixtureBackend, FixtureData, FixturePoint, QueryBackend, QueryError,
    QueryResult, SeriesFixture, StoreMetric, StoreRequest,
};

use crate::clock::FixedClock;
use crate::engine::AnalyticsEngine;
use crate::interval::DateFilter;

type FailWhen = Box<dyn Fn(&StoreRequest) -> bool + Send + Sync>;

/// Fixture backend with scripted failures, latency and call accounting
pub(crate) struct ScriptedBackend {
    inner: FixtureBackend,
    fail_when: Option<FailWhen>,
    delay: Option<Duration>,
    requests: Mutex<Vec<StoreRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new(data: FixtureData) -> Self {
        Self {
            inner: FixtureBackend::new(data),
            fail_when: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_when(
        mut self,
        predicate: impl Fn(&StoreRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn calls_for(&self, metric: StoreMetric) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.metric == metric)
            .count()
    }

    pub(crate) fn requests(&self) -> Vec<StoreRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn execute(&self, request: &StoreRequest) -> Result<QueryResult, QueryError> {
        self.requests.lock().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match &self.fail_when {
            Some(fail) if fail(request) => Err(QueryError::Execution(format!(
                "scripted failure for {} {}",
                request.scope, request.metric
            ))),
            _ => self.inner.execute(request).await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub(crate) fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// 2024-01-01 through 2024-01-07
pub(crate) fn week() -> DateFilter {
    DateFilter::range(ts("2024-01-01T00:00:00Z"), ts("2024-01-07T23:59:59Z"))
}

/// Daily values starting at `first_day`, stamped mid-day
pub(crate) fn daily(scope: &str, metric: StoreMetric, first_day: &str, values: &[f64]) -> SeriesFixture {
    let first = date(first_day);
    SeriesFixture {
        scope: scope.to_string(),
        metric,
        segments: Vec::new(),
        points: values
            .iter()
            .enumerate()
            .map(|(i, value)| FixturePoint {
                timestamp: (first + chrono::Duration::days(i as i64))
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
                    .and_utc(),
                value: *value,
            })
            .collect(),
    }
}

pub(crate) fn cohort(scope: &str, anchor: &str, offsets: &[(u32, u64)]) -> CohortFixture {
    CohortFixture {
        scope: scope.to_string(),
        anchor: date(anchor),
        segments: Vec::new(),
        offsets: offsets.iter().copied().collect(),
    }
}

/// Clock well after the test week, so entries are historical
pub(crate) fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()))
}

pub(crate) fn engine_with(backend: Arc<ScriptedBackend>, config: EngineConfig) -> AnalyticsEngine {
    AnalyticsEngine::new(
        backend,
        Arc::new(MemoryCache::new(1_000)),
        clock(),
        &CacheConfig::default(),
        &config,
    )
}

pub(crate) fn engine(backend: Arc<ScriptedBackend>) -> AnalyticsEngine {
    engine_with(backend, EngineConfig::default())
}
