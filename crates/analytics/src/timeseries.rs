//! Time series types
//!
//! Series produced by the engine are always aligned to an interval skeleton:
//! one point per bucket, ascending, no gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delta::percent_of_cohort;
use crate::interval::Skeleton;

/// A single data point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Bucket start (or raw row timestamp before alignment)
    pub timestamp: DateTime<Utc>,
    /// The aggregated value
    pub value: f64,
}

impl MetricPoint {
    /// Create a new point
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Skeleton-aligned series of one metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Points in ascending timestamp order
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    /// A zero at every skeleton bucket
    pub fn zeros(skeleton: &Skeleton) -> Self {
        Self {
            points: skeleton.iter().map(|ts| MetricPoint::new(ts, 0.0)).collect(),
        }
    }

    /// Sum of all values
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }

    /// Value at a bucket index (0 when out of range)
    pub fn value_at(&self, index: usize) -> f64 {
        self.points.get(index).map_or(0.0, |p| p.value)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// A retention data point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPoint {
    /// Skeleton bucket this day offset maps to
    pub timestamp: DateTime<Utc>,
    /// Players retained at this offset, summed over anchors
    pub retention: u64,
}

/// Cohort retention, index `i` = day offset `i`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionSeries {
    /// Points in ascending order
    pub points: Vec<RetentionPoint>,
}

impl RetentionSeries {
    /// A zero at every skeleton bucket
    pub fn zeros(skeleton: &Skeleton) -> Self {
        Self::from_counts(skeleton, &[])
    }

    /// Place counts onto the skeleton; missing indices are zero, extras are dropped
    pub fn from_counts(skeleton: &Skeleton, counts: &[u64]) -> Self {
        Self {
            points: skeleton
                .iter()
                .enumerate()
                .map(|(i, timestamp)| RetentionPoint {
                    timestamp,
                    retention: counts.get(i).copied().unwrap_or(0),
                })
                .collect(),
        }
    }

    /// Retained count at a bucket index (0 when out of range)
    pub fn value_at(&self, index: usize) -> u64 {
        self.points.get(index).map_or(0, |p| p.retention)
    }

    /// Every offset as a percentage of day 0
    pub fn percentages(&self) -> Vec<String> {
        let cohort = self.value_at(0);
        self.points
            .iter()
            .map(|p| percent_of_cohort(p.retention, cohort))
            .collect()
    }

    /// Get number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One row of a merged timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    /// Bucket start
    pub timestamp: DateTime<Utc>,
    /// Daily (or per-bucket) active users
    pub dau: f64,
    /// New users
    pub new_users: f64,
    /// Revenue
    pub revenue: f64,
    /// Cohort retention
    pub retention: u64,
}

impl TimelineRow {
    /// An all-zero row
    pub fn zero(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            dau: 0.0,
            new_users: 0.0,
            revenue: 0.0,
            retention: 0,
        }
    }

    /// Element-wise sum with another row of the same bucket
    pub fn accumulate(&mut self, other: &TimelineRow) {
        self.dau += other.dau;
        self.new_users += other.new_users;
        self.revenue += other.revenue;
        self.retention += other.retention;
    }
}

/// Current minus past totals for one entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    /// Active users delta
    pub dau: f64,
    /// New users delta
    pub new_users: f64,
    /// Revenue delta
    pub revenue: f64,
}

/// Sum of entity deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallDelta {
    /// Active users delta
    pub delta_dau: f64,
    /// New users delta
    pub delta_new_users: f64,
    /// Revenue delta
    pub delta_revenue: f64,
}

impl OverallDelta {
    /// Add one entity's delta
    pub fn accumulate(&mut self, delta: &EntityDelta) {
        self.delta_dau += delta.dau;
        self.delta_new_users += delta.new_users;
        self.delta_revenue += delta.revenue;
    }
}

/// Comparison between current and previous period totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonData {
    /// Current period total
    pub current_total: f64,
    /// Previous period total
    pub previous_total: f64,
    /// Absolute change (current - previous)
    pub change: f64,
    /// Percent change ((current - previous) / previous * 100)
    pub percent_change: f64,
}

impl ComparisonData {
    /// Calculate comparison from current and previous totals
    pub fn calculate(current_total: f64, previous_total: f64) -> Self {
        let change = current_total - previous_total;
        let percent_change = if previous_total != 0.0 {
            (change / previous_total) * 100.0
        } else if current_total != 0.0 {
            100.0
        } else {
            0.0
        };

        Self {
            current_total,
            previous_total,
            change,
            percent_change,
        }
    }
}

/// Per-metric period comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Active users
    pub dau: ComparisonData,
    /// New users
    pub new_users: ComparisonData,
    /// Revenue
    pub revenue: ComparisonData,
}

/// Merged timeline of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTimeline {
    /// Entity this timeline belongs to
    pub entity_id: String,
    /// Current minus past totals
    pub delta: EntityDelta,
    /// Previous totals and percent changes
    pub comparison: Comparison,
    /// One row per skeleton bucket
    pub series: Vec<TimelineRow>,
    /// Some metric could not be computed and was zero-filled
    pub degraded: bool,
    /// What went wrong, one message per failed metric
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl EntityTimeline {
    /// A zero-filled timeline recording why it is empty
    pub fn zeroed(entity_id: impl Into<String>, skeleton: &Skeleton, error: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            delta: EntityDelta::default(),
            comparison: Comparison::default(),
            series: skeleton.iter().map(TimelineRow::zero).collect(),
            degraded: true,
            errors: vec![error.into()],
        }
    }
}

/// Whether every entity and metric was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupStatus {
    /// Everything computed
    Complete,
    /// At least one entity or metric was zero-filled
    Degraded,
}

/// Multi-entity rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupResult {
    /// Per-bucket sum over entities
    pub overall_series: Vec<TimelineRow>,
    /// Entity timelines in request order
    pub per_entity: Vec<EntityTimeline>,
    /// Sum of entity deltas
    pub overall_delta: OverallDelta,
    /// Completion status
    pub status: RollupStatus,
    /// Entities whose timeline is degraded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_entities: Vec<String>,
}

/// Retention series of one entity with its failure state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionReport {
    /// Entity the series belongs to
    pub entity_id: String,
    /// Summed cohort retention
    pub series: RetentionSeries,
    /// An anchor query failed; indices from that anchor on are zero-filled
    pub degraded: bool,
    /// Failure message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
