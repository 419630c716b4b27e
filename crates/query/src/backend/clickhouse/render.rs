//! SQL rendering for store requests
//!
//! Expected tables (all carry `game_id`, `player_id`, `branch`, `environment`):
//! - `sessions`: one row per session, `timestamp`
//! - `players`: one row per player, `first_seen`
//! - `purchases`: one row per purchase, `timestamp`, `amount`
//! - `segment_members`: `segment_id`, `player_id`

use chrono::{DateTime, Utc};

use crate::request::{RequestFilters, StoreMetric, StoreRequest};
use crate::result::{DATE_COLUMN, OFFSET_COLUMN, VALUE_COLUMN};

/// Render a store request to ClickHouse SQL
pub fn render(request: &StoreRequest) -> String {
    match request.metric {
        StoreMetric::ActiveUsers => {
            series_query(request, "sessions", "timestamp", "COUNT(DISTINCT player_id)")
        }
        StoreMetric::NewUsers => {
            series_query(request, "players", "first_seen", "COUNT(DISTINCT player_id)")
        }
        StoreMetric::Revenue => series_query(request, "purchases", "timestamp", "SUM(amount)"),
        StoreMetric::Retention => cohort_query(request),
    }
}

fn series_query(request: &StoreRequest, table: &str, ts_col: &str, agg: &str) -> String {
    let bucket = format!(
        "{}({})",
        request.window.granularity.clickhouse_fn(),
        ts_col
    );

    SelectBuilder::new(table)
        .select_as(bucket, DATE_COLUMN)
        .select_as(agg, VALUE_COLUMN)
        .where_clause(format!("game_id = '{}'", escape_string(&request.scope)))
        .where_clause(time_range(
            ts_col,
            request.window.start,
            request.window.end,
        ))
        .apply_filters(&request.filters)
        .group_by(DATE_COLUMN)
        .order_by(DATE_COLUMN)
        .build()
}

/// Players first seen on the anchor day, counted per day offset of activity
fn cohort_query(request: &StoreRequest) -> String {
    let scope = escape_string(&request.scope);
    let anchor = format_ts(request.window.start);

    let cohort = SelectBuilder::new("players")
        .select("player_id")
        .where_clause(format!("game_id = '{}'", scope))
        .where_clause(format!("toDate(first_seen) = toDate('{}')", anchor))
        .apply_filters(&request.filters)
        .build();

    SelectBuilder::new("sessions")
        .select_as(
            format!("dateDiff('day', toDate('{}'), toDate(timestamp))", anchor),
            OFFSET_COLUMN,
        )
        .select_as("COUNT(DISTINCT player_id)", VALUE_COLUMN)
        .where_clause(format!("game_id = '{}'", scope))
        .where_clause(time_range(
            "timestamp",
            request.window.start,
            request.window.end,
        ))
        .where_clause(format!("player_id IN ({})", cohort))
        .group_by(OFFSET_COLUMN)
        .order_by(OFFSET_COLUMN)
        .build()
}

fn time_range(col: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "{} >= '{}' AND {} <= '{}'",
        col,
        format_ts(start),
        col,
        format_ts(end)
    )
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Minimal SELECT builder
struct SelectBuilder {
    table: String,
    select: Vec<String>,
    where_clauses: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
}

impl SelectBuilder {
    fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Vec::new(),
            where_clauses: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
        }
    }

    fn select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }

    fn select_as(mut self, expr: impl Into<String>, alias: impl Into<String>) -> Self {
        self.select.push(format!("{} AS {}", expr.into(), alias.into()));
        self
    }

    fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clauses.push(clause.into());
        self
    }

    fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    fn apply_filters(mut self, filters: &RequestFilters) -> Self {
        if !filters.segments.is_empty() {
            let ids: Vec<String> = filters
                .segments
                .iter()
                .map(|s| format!("'{}'", escape_string(s)))
                .collect();
            self.where_clauses.push(format!(
                "player_id IN (SELECT player_id FROM segment_members WHERE segment_id IN ({}))",
                ids.join(", ")
            ));
        }

        if let Some(branch) = &filters.branch {
            let op = if branch.include { "=" } else { "!=" };
            self.where_clauses
                .push(format!("branch {} '{}'", op, escape_string(&branch.branch)));
        }

        if let Some(env) = &filters.environment {
            let op = if env.include { "=" } else { "!=" };
            self.where_clauses.push(format!(
                "environment {} '{}'",
                op,
                escape_string(&env.environment)
            ));
        }

        self
    }

    fn build(self) -> String {
        let mut sql = String::new();

        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        sql
    }
}

/// Escape a string literal for ClickHouse
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
