//! Cohort retention
//!
//! Retention needs a distinct cohort per anchor day. For every day `k` of
//! the interval (capped), one cohort query covers `[day k, interval end]` and
//! returns counts keyed by day offset from that anchor. Counts sharing an
//! offset are summed across anchors, so index `i` of the series is day
//! offset `i`.
//!
//! A failed anchor is never read as "nobody retained". When anchor `k` is
//! the first to fail, every index from `k` on is incomplete, so those indices
//! are zero-filled and the outcome carries the failure.

use chrono::{Duration, NaiveDate};
use futures_util::future::join_all;
use tracing::warn;

use beacon_query::{Granularity, RequestFilters, Window};

use crate::interval::{Interval, start_of_day};
use crate::metrics::{CohortCounts, MetricFetcher};
use crate::timeseries::RetentionSeries;

/// The first anchor whose cohort query failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortFailure {
    /// Anchor position (day offset from the interval start)
    pub anchor_index: usize,
    /// Anchor day
    pub anchor: NaiveDate,
    /// Error message
    pub error: String,
}

/// Retention series plus the failure that truncated it, if any
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionOutcome {
    /// Skeleton-aligned series
    pub series: RetentionSeries,
    /// Set when an anchor query failed
    pub failure: Option<CohortFailure>,
    /// Anchor queries issued
    pub anchors: usize,
    /// Anchor queries that failed
    pub failed_anchors: usize,
}

impl RetentionOutcome {
    /// Whether part of the series is zero-filled because of a failure
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether every anchor query failed
    pub fn is_unavailable(&self) -> bool {
        self.anchors > 0 && self.failed_anchors == self.anchors
    }
}

/// Computes retention by iterating anchors and shrinking the window
pub struct CohortRetentionComputer<'a> {
    fetcher: &'a MetricFetcher,
    max_days: u32,
}

impl<'a> CohortRetentionComputer<'a> {
    /// Create a computer issuing at most `max_days` anchor queries per interval
    pub fn new(fetcher: &'a MetricFetcher, max_days: u32) -> Self {
        Self { fetcher, max_days }
    }

    /// Anchor windows `[day k, end]` in anchor order
    pub fn anchor_windows(&self, interval: &Interval) -> Vec<Window> {
        let first_day = interval.start.date_naive();
        (0..interval.days().min(self.max_days))
            .map(|k| {
                let start = if k == 0 {
                    interval.start
                } else {
                    start_of_day(first_day + Duration::days(i64::from(k)))
                };
                Window {
                    start,
                    end: interval.end,
                    granularity: Granularity::Day,
                }
            })
            .collect()
    }

    /// Run every anchor query concurrently and reassemble the series
    pub async fn compute(
        &self,
        scope: &str,
        interval: &Interval,
        filters: &RequestFilters,
        force_refresh: bool,
    ) -> RetentionOutcome {
        let skeleton = interval.timestamps();
        let windows = self.anchor_windows(interval);

        let results = join_all(
            windows
                .iter()
                .map(|window| self.fetcher.fetch_cohort(scope, *window, filters, force_refresh)),
        )
        .await;

        let anchors = results.len();
        let failed_anchors = results.iter().filter(|r| r.is_err()).count();

        let mut cohorts = Vec::with_capacity(anchors);
        let mut failure = None;
        for (anchor_index, (window, result)) in windows.iter().zip(results).enumerate() {
            match result {
                Ok(counts) => cohorts.push(counts),
                Err(e) => {
                    warn!(
                        scope,
                        anchor = %window.start.date_naive(),
                        error = %e,
                        "cohort query failed; retention truncated"
                    );
                    failure = Some(CohortFailure {
                        anchor_index,
                        anchor: window.start.date_naive(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        let mut totals = sum_anchors(&cohorts, skeleton.len());
        if let Some(failure) = &failure {
            totals.iter_mut().skip(failure.anchor_index).for_each(|v| *v = 0);
        }

        RetentionOutcome {
            series: RetentionSeries::from_counts(&skeleton, &totals),
            failure,
            anchors,
            failed_anchors,
        }
    }
}

/// Sum anchor cohorts by day offset
///
/// Offsets past `len` are dropped; absent offsets count as zero.
pub fn sum_anchors(cohorts: &[CohortCounts], len: usize) -> Vec<u64> {
    let mut totals = vec![0u64; len];
    for counts in cohorts {
        for (offset, count) in counts.iter() {
            if let Some(slot) = totals.get_mut(offset as usize) {
                *slot += count;
            }
        }
    }
    totals
}
