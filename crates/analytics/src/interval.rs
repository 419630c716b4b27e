//! Interval resolution
//!
//! Turns an inbound date filter into a resolved [`Interval`] (start, end,
//! granularity, bucket count), derives the comparison interval of the same
//! length immediately before it, and produces the timestamp skeleton every
//! series of the interval is aligned to.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use beacon_query::{Granularity, Window};

use crate::error::{AnalyticsError, Result};

/// Spans up to this many seconds are bucketed per minute
pub const MINUTE_GRANULARITY_MAX_SPAN_SECS: i64 = 60 * 60;

/// Spans up to this many seconds are bucketed per hour; longer spans per day
pub const HOUR_GRANULARITY_MAX_SPAN_SECS: i64 = 24 * 60 * 60;

/// Largest number of buckets an interval may span
pub const MAX_BUCKETS: u32 = 100_000;

/// Pick the bucket width for a span
///
/// Monotonic in the span length: a longer span never gets a finer granularity.
pub fn granularity_for_span(span: Duration) -> Granularity {
    let secs = span.num_seconds();
    if secs <= MINUTE_GRANULARITY_MAX_SPAN_SECS {
        Granularity::Minute
    } else if secs <= HOUR_GRANULARITY_MAX_SPAN_SECS {
        Granularity::Hour
    } else {
        Granularity::Day
    }
}

/// Inbound date filter
///
/// Either a `[start, end]` pair of ISO 8601 timestamps or an already resolved
/// interval wrapped as `{"interval": {...}}`, which passes through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateFilter {
    /// Explicit start and end
    Range(DateTime<Utc>, DateTime<Utc>),
    /// Pre-resolved interval
    Resolved {
        /// The interval to use as-is
        interval: Interval,
    },
}

impl DateFilter {
    /// Create a range filter
    pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Range(start, end)
    }

    /// Parse a date filter expression relative to `now`
    ///
    /// Supported formats:
    /// - Relative: `30m`, `1h`, `24h`, `7d`, `2w`
    /// - Predefined: `today`, `yesterday`
    /// - Custom dates: `2024-01-01,2024-01-31` (whole days)
    /// - Custom timestamps: `2024-01-01T06:00:00Z,2024-01-01T07:00:00Z`
    pub fn parse(s: &str, now: DateTime<Utc>) -> Result<Self> {
        let s = s.trim();
        let lower = s.to_lowercase();

        if let Some(filter) = parse_predefined(&lower, now)? {
            return Ok(filter);
        }
        if let Some(filter) = parse_relative(&lower, now)? {
            return Ok(filter);
        }
        if let Some(filter) = parse_custom(s)? {
            return Ok(filter);
        }

        Err(AnalyticsError::InvalidFilter(format!(
            "unknown date filter format: {}",
            s
        )))
    }
}

/// A resolved time interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Start of the interval (inclusive)
    pub start: DateTime<Utc>,
    /// End of the interval (inclusive)
    pub end: DateTime<Utc>,
    /// Bucket width
    pub granularity: Granularity,
    /// Number of bucket steps between the truncated start and end
    pub diff: u32,
}

impl Interval {
    /// Resolve an interval, choosing the granularity from its span
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(AnalyticsError::InvalidInterval(format!(
                "end {} is before start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Self::with_granularity(start, end, granularity_for_span(end - start))
    }

    /// Resolve an interval with a fixed granularity (`start <= end` assumed)
    fn with_granularity(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Self> {
        let diff = bucket_steps(start, end, granularity);
        if diff >= MAX_BUCKETS {
            return Err(AnalyticsError::InvalidInterval(format!(
                "{} to {} spans more than {} {} buckets",
                start.to_rfc3339(),
                end.to_rfc3339(),
                MAX_BUCKETS,
                granularity
            )));
        }
        Ok(Self {
            start,
            end,
            granularity,
            diff,
        })
    }

    /// Resolve a date filter
    ///
    /// A pre-resolved interval keeps its bounds and granularity, but `diff`
    /// is always derived from them.
    pub fn from_date_filter(filter: &DateFilter) -> Result<Self> {
        match filter {
            DateFilter::Range(start, end) => Self::new(*start, *end),
            DateFilter::Resolved { interval } => {
                if interval.end < interval.start {
                    return Err(AnalyticsError::InvalidInterval(
                        "resolved interval ends before it starts".to_string(),
                    ));
                }
                Self::with_granularity(interval.start, interval.end, interval.granularity)
            }
        }
    }

    /// The comparison interval: same length and granularity, ending one
    /// second before this interval starts
    pub fn past(&self) -> Result<Self> {
        let end = self.start.checked_sub_signed(Duration::seconds(1));
        let start = end.and_then(|end| end.checked_sub_signed(self.duration()));
        match (start, end) {
            (Some(start), Some(end)) => Self::with_granularity(start, end, self.granularity),
            _ => Err(AnalyticsError::InvalidInterval(format!(
                "no comparison interval before {}",
                self.start.to_rfc3339()
            ))),
        }
    }

    /// Length of the interval
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Number of calendar days touched (inclusive)
    pub fn days(&self) -> u32 {
        let days = (self.end.date_naive() - self.start.date_naive()).num_days() + 1;
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Store window covering this interval
    pub fn window(&self) -> Window {
        Window {
            start: self.start,
            end: self.end,
            granularity: self.granularity,
        }
    }

    /// Timestamp skeleton of `diff + 1` bucket starts
    pub fn timestamps(&self) -> Skeleton {
        Skeleton {
            origin: self.granularity.truncate(self.start),
            granularity: self.granularity,
            len: self.diff as usize + 1,
        }
    }
}

/// Ordered bucket timestamps of an interval
///
/// Cheap to copy; every call to [`Skeleton::iter`] restarts from the first
/// bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skeleton {
    origin: DateTime<Utc>,
    granularity: Granularity,
    len: usize,
}

impl Skeleton {
    /// Number of buckets
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a skeleton has at least one bucket
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bucket width
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Bucket start at `index`
    pub fn get(&self, index: usize) -> Option<DateTime<Utc>> {
        if index >= self.len {
            return None;
        }
        let offset = self.granularity.bucket().checked_mul(i32::try_from(index).ok()?)?;
        self.origin.checked_add_signed(offset)
    }

    /// Iterate over the bucket starts
    pub fn iter(&self) -> SkeletonIter {
        SkeletonIter {
            skeleton: *self,
            next: 0,
        }
    }
}

impl IntoIterator for Skeleton {
    type Item = DateTime<Utc>;
    type IntoIter = SkeletonIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &Skeleton {
    type Item = DateTime<Utc>;
    type IntoIter = SkeletonIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`Skeleton`]
#[derive(Debug, Clone)]
pub struct SkeletonIter {
    skeleton: Skeleton,
    next: usize,
}

impl Iterator for SkeletonIter {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let ts = self.skeleton.get(self.next)?;
        self.next += 1;
        Some(ts)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.skeleton.len.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SkeletonIter {}

fn bucket_steps(start: DateTime<Utc>, end: DateTime<Utc>, granularity: Granularity) -> u32 {
    let steps = match granularity {
        Granularity::Day => (end.date_naive() - start.date_naive()).num_days(),
        Granularity::Hour => (granularity.truncate(end) - granularity.truncate(start)).num_hours(),
        Granularity::Minute => {
            (granularity.truncate(end) - granularity.truncate(start)).num_minutes()
        }
    };
    u32::try_from(steps.max(0)).unwrap_or(u32::MAX)
}

fn parse_predefined(s: &str, now: DateTime<Utc>) -> Result<Option<DateFilter>> {
    let day = match s {
        "today" => now.date_naive(),
        "yesterday" => now
            .date_naive()
            .pred_opt()
            .ok_or_else(|| out_of_range(s))?,
        _ => return Ok(None),
    };
    Ok(Some(DateFilter::Range(start_of_day(day), end_of_day(day)?)))
}

fn parse_relative(s: &str, now: DateTime<Utc>) -> Result<Option<DateFilter>> {
    let Some((num, unit)) = extract_num_unit(s) else {
        return Ok(None);
    };
    let today = now.date_naive();

    let filter = match unit {
        // sub-day spans end now so the granularity follows the span
        'm' | 'h' => {
            let span = if unit == 'm' {
                Duration::try_minutes(num)
            } else {
                Duration::try_hours(num)
            };
            let start = span
                .and_then(|span| now.checked_sub_signed(span))
                .ok_or_else(|| out_of_range(s))?;
            DateFilter::Range(start, now)
        }
        // 7d means today + 6 previous days
        'd' | 'w' => {
            let days = if unit == 'd' { Some(num) } else { num.checked_mul(7) };
            let first = days
                .and_then(|days| Duration::try_days(days - 1))
                .and_then(|back| today.checked_sub_signed(back))
                .ok_or_else(|| out_of_range(s))?;
            DateFilter::Range(start_of_day(first), end_of_day(today)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(filter))
}

fn out_of_range(s: &str) -> AnalyticsError {
    AnalyticsError::InvalidFilter(format!("date filter out of range: {}", s))
}

fn parse_custom(s: &str) -> Result<Option<DateFilter>> {
    let Some((start, end)) = s.split_once(',') else {
        return Ok(None);
    };
    let (start, end) = (start.trim(), end.trim());

    if let (Ok(start), Ok(end)) = (
        DateTime::parse_from_rfc3339(start),
        DateTime::parse_from_rfc3339(end),
    ) {
        return Ok(Some(DateFilter::Range(
            start.with_timezone(&Utc),
            end.with_timezone(&Utc),
        )));
    }

    let start = parse_date(start)?;
    let end = parse_date(end)?;
    Ok(Some(DateFilter::Range(start_of_day(start), end_of_day(end)?)))
}

fn extract_num_unit(s: &str) -> Option<(i64, char)> {
    let unit = s.chars().last()?;
    if !unit.is_ascii_alphabetic() {
        return None;
    }
    let num: i64 = s[..s.len() - 1].parse().ok()?;
    (num > 0).then_some((num, unit))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        AnalyticsError::InvalidFilter(format!(
            "invalid date: {} (use YYYY-MM-DD or RFC 3339)",
            s
        ))
    })
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    let next = date
        .succ_opt()
        .ok_or_else(|| AnalyticsError::InvalidFilter(format!("date out of range: {}", date)))?;
    Ok(start_of_day(next) - Duration::seconds(1))
}
