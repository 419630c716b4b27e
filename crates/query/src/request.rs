//! Canonical typed store request
//!
//! The engine describes what it needs with a [`StoreRequest`]; each backend
//! decides how to render and execute it. The serialized form of a request is
//! stable (fields in declaration order, segments sorted and deduplicated), so
//! it doubles as the input of the cache fingerprint.

use std::fmt;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// Bucket width along a series' time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One bucket per minute
    Minute,
    /// One bucket per hour
    Hour,
    /// One bucket per calendar day (UTC)
    Day,
}

impl Granularity {
    /// Width of one bucket
    pub fn bucket(&self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        }
    }

    /// Round a timestamp down to the start of its bucket
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.duration_trunc(self.bucket()).unwrap_or(ts)
    }

    /// Name used in requests and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// ClickHouse bucketing function for this granularity
    pub fn clickhouse_fn(&self) -> &'static str {
        match self {
            Self::Minute => "toStartOfMinute",
            Self::Hour => "toStartOfHour",
            Self::Day => "toDate",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric a store request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMetric {
    /// Distinct active players per bucket
    ActiveUsers,
    /// Players whose first session falls in the bucket
    NewUsers,
    /// Purchase revenue per bucket
    Revenue,
    /// Players of the cohort anchored at the window start, per day offset
    Retention,
}

impl StoreMetric {
    /// Metric name for logging/identification
    pub fn name(&self) -> &'static str {
        match self {
            Self::ActiveUsers => "dau",
            Self::NewUsers => "new_users",
            Self::Revenue => "revenue",
            Self::Retention => "retention",
        }
    }

    /// Whether rows are keyed by day offset instead of timestamp
    pub fn is_cohort(&self) -> bool {
        matches!(self, Self::Retention)
    }
}

impl fmt::Display for StoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Time window of a store request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Start of the window (inclusive)
    pub start: DateTime<Utc>,
    /// End of the window (inclusive)
    pub end: DateTime<Utc>,
    /// Bucket width for series rows
    pub granularity: Granularity,
}

/// Restrict to players on (or off) a build branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchFilter {
    /// Branch name
    pub branch: String,
    /// `true` keeps only this branch, `false` excludes it
    pub include: bool,
}

impl BranchFilter {
    /// Keep only the given branch
    pub fn include(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            include: true,
        }
    }

    /// Exclude the given branch
    pub fn exclude(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            include: false,
        }
    }
}

/// Restrict to players in (or out of) a deployment environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentFilter {
    /// Environment name
    pub environment: String,
    /// `true` keeps only this environment, `false` excludes it
    pub include: bool,
}

impl EnvironmentFilter {
    /// Keep only the given environment
    pub fn include(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            include: true,
        }
    }

    /// Exclude the given environment
    pub fn exclude(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            include: false,
        }
    }
}

/// Player filters shared by every metric of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestFilters {
    /// Segment IDs; a player must belong to one of them (empty = everyone)
    pub segments: Vec<String>,
    /// Optional branch filter
    pub branch: Option<BranchFilter>,
    /// Optional environment filter
    pub environment: Option<EnvironmentFilter>,
}

impl RequestFilters {
    /// Create filters from a segment list (sorted and deduplicated)
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        segments.sort();
        segments.dedup();
        Self {
            segments,
            branch: None,
            environment: None,
        }
    }

    /// Set the branch filter
    pub fn with_branch(mut self, branch: BranchFilter) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Set the environment filter
    pub fn with_environment(mut self, environment: EnvironmentFilter) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Check if no filter is set
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.branch.is_none() && self.environment.is_none()
    }
}

/// A canonical parameterized store request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreRequest {
    /// Store scope key (e.g., a game's storage ID)
    pub scope: String,
    /// Requested metric
    pub metric: StoreMetric,
    /// Requested window
    pub window: Window,
    /// Player filters
    pub filters: RequestFilters,
}

impl StoreRequest {
    /// Create a new request
    pub fn new(
        scope: impl Into<String>,
        metric: StoreMetric,
        window: Window,
        filters: RequestFilters,
    ) -> Self {
        Self {
            scope: scope.into(),
            metric,
            window,
            filters,
        }
    }

    /// Canonical serialization of this request
    pub fn canonical(&self) -> Result<String, crate::QueryError> {
        Ok(serde_json::to_string(self)?)
    }
}
