//! Beacon Analytics Engine
//!
//! Time-series aggregation over a metric store: per-entity timelines of
//! active users, new users, revenue and cohort retention, rolled up across
//! entities with period-over-period deltas.
//!
//! # Overview
//!
//! - **Intervals**: date filters resolved to an interval, its comparison
//!   interval and a gap-free timestamp skeleton
//! - **Metric cache**: fingerprinted store requests with a TTL policy
//! - **Retention**: cohorts reassembled from per-anchor queries
//! - **Merge**: sparse store rows aligned onto the skeleton
//! - **Aggregation**: concurrent per-entity pipelines folded into a rollup
//! - **Deltas**: current minus past totals and cohort percentages
//!
//! # Usage
//!
//! ```ignore
//! use beacon_analytics::{AnalyticsEngine, DateFilter, IdentityResolver, RollupRequest};
//!
//! let engine = AnalyticsEngine::new(store, cache, clock, &config.cache, &config.engine);
//!
//! let filter = DateFilter::parse("7d", engine.clock().now())?;
//! let request = RollupRequest::new(EntityScope::Many(games), filter)
//!     .with_segments(["whales"]);
//!
//! let rollup = engine.rollup(&request, &IdentityResolver).await?;
//! println!("{:?}", rollup.overall_delta);
//! ```

pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod delta;
pub mod engine;
pub mod error;
pub mod filter;
pub mod interval;
pub mod merge;
pub mod metrics;
pub mod scope;
pub mod timeseries;

#[cfg(test)]
mod aggregator_test;
#[cfg(test)]
mod cache_test;
#[cfg(test)]
mod engine_test;
#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use aggregator::{EntityAggregator, EntityOutcome, QueryPlan};
pub use cache::MetricQueryCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use delta::{Field, percent_of_cohort};
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, Result};
pub use filter::{EntityScope, RollupRequest};
pub use interval::{DateFilter, Interval, Skeleton};
pub use metrics::{CohortCounts, CohortRetentionComputer, MetricFetcher, RetentionOutcome};
pub use scope::{IdentityResolver, MapResolver, ScopeResolver};
pub use timeseries::{
    Comparison, ComparisonData, EntityDelta, EntityTimeline, MetricPoint, MetricSeries,
    OverallDelta, RetentionPoint, RetentionReport, RetentionSeries, RollupResult, RollupStatus,
    TimelineRow,
};
