//! Skeleton alignment
//!
//! Store rows may be sparse or finer-grained than the skeleton. Every row is
//! truncated to the skeleton granularity and summed into its bucket, so a
//! day skeleton matches rows by calendar day. Buckets without rows are zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::interval::Skeleton;
use crate::timeseries::{MetricPoint, MetricSeries, RetentionSeries, TimelineRow};

/// Sum rows from any number of sources into skeleton buckets
///
/// Rows outside the skeleton are dropped. Aligning an already aligned
/// series returns it unchanged.
pub fn align<'a>(
    skeleton: &Skeleton,
    sources: impl IntoIterator<Item = &'a [MetricPoint]>,
) -> MetricSeries {
    let granularity = skeleton.granularity();
    let mut buckets: HashMap<DateTime<Utc>, f64> = HashMap::new();
    for rows in sources {
        for row in rows {
            *buckets.entry(granularity.truncate(row.timestamp)).or_default() += row.value;
        }
    }

    MetricSeries {
        points: skeleton
            .iter()
            .map(|ts| MetricPoint::new(ts, buckets.get(&ts).copied().unwrap_or(0.0)))
            .collect(),
    }
}

/// Combine aligned metric series into timeline rows
///
/// All inputs are expected on the same skeleton; a shorter input reads as zero.
pub fn merge_timeline(
    skeleton: &Skeleton,
    dau: &MetricSeries,
    new_users: &MetricSeries,
    revenue: &MetricSeries,
    retention: &RetentionSeries,
) -> Vec<TimelineRow> {
    skeleton
        .iter()
        .enumerate()
        .map(|(i, timestamp)| TimelineRow {
            timestamp,
            dau: dau.value_at(i),
            new_users: new_users.value_at(i),
            revenue: revenue.value_at(i),
            retention: retention.value_at(i),
        })
        .collect()
}

/// Sum entity timelines bucket by bucket
pub fn fold<'a>(
    skeleton: &Skeleton,
    timelines: impl IntoIterator<Item = &'a [TimelineRow]>,
) -> Vec<TimelineRow> {
    let mut overall: Vec<TimelineRow> = skeleton.iter().map(TimelineRow::zero).collect();
    for series in timelines {
        for (total, row) in overall.iter_mut().zip(series) {
            total.accumulate(row);
        }
    }
    overall
}
