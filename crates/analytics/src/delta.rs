//! Period deltas and cohort percentages

use serde::{Deserialize, Serialize};

use crate::timeseries::{Comparison, ComparisonData, EntityDelta, TimelineRow};

/// Timeline field a delta is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Active users
    Dau,
    /// New users
    NewUsers,
    /// Revenue
    Revenue,
    /// Cohort retention
    Retention,
}

impl Field {
    fn value(&self, row: &TimelineRow) -> f64 {
        match self {
            Self::Dau => row.dau,
            Self::NewUsers => row.new_users,
            Self::Revenue => row.revenue,
            Self::Retention => row.retention as f64,
        }
    }
}

/// Sum a field across a series
pub fn sum(series: &[TimelineRow], field: Field) -> f64 {
    series.iter().map(|row| field.value(row)).sum()
}

/// Current total minus past total
pub fn delta(current: &[TimelineRow], past: &[TimelineRow], field: Field) -> f64 {
    sum(current, field) - sum(past, field)
}

/// Deltas of the three additive metrics
pub fn entity_delta(current: &[TimelineRow], past: &[TimelineRow]) -> EntityDelta {
    EntityDelta {
        dau: delta(current, past, Field::Dau),
        new_users: delta(current, past, Field::NewUsers),
        revenue: delta(current, past, Field::Revenue),
    }
}

/// Previous totals and percent changes of the three additive metrics
pub fn comparison(current: &[TimelineRow], past: &[TimelineRow]) -> Comparison {
    let compare = |field| ComparisonData::calculate(sum(current, field), sum(past, field));
    Comparison {
        dau: compare(Field::Dau),
        new_users: compare(Field::NewUsers),
        revenue: compare(Field::Revenue),
    }
}

/// Render `value` as a whole percentage of `cohort`
///
/// An empty cohort renders as `"0%"`.
pub fn percent_of_cohort(value: u64, cohort: u64) -> String {
    if cohort == 0 {
        return "0%".to_string();
    }
    format!("{:.0}%", value as f64 / cohort as f64 * 100.0)
}
