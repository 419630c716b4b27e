//! Table and JSON rendering of engine results

use anyhow::Result;
use serde::Serialize;

use beacon_analytics::{
    Comparison, EntityTimeline, RetentionReport, RollupResult, RollupStatus, TimelineRow,
    percent_of_cohort,
};

use super::OutputFormat;

/// Print any result as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn rollup(result: &RollupResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(result);
    }

    println!("Overall");
    rows(&result.overall_series);
    println!();
    println!(
        "Delta vs previous period:  DAU {:+.0}  New {:+.0}  Revenue {:+.2}",
        result.overall_delta.delta_dau,
        result.overall_delta.delta_new_users,
        result.overall_delta.delta_revenue
    );

    println!();
    println!("{:<24} {:>12} {:>12} {:>14}", "Entity", "ΔDAU", "ΔNew", "ΔRevenue");
    println!("{}", "-".repeat(65));
    for entity in &result.per_entity {
        let marker = if entity.degraded { " !" } else { "" };
        println!(
            "{:<24} {:>+12.0} {:>+12.0} {:>+14.2}{}",
            entity.entity_id, entity.delta.dau, entity.delta.new_users, entity.delta.revenue, marker
        );
    }

    if result.status == RollupStatus::Degraded {
        eprintln!();
        eprintln!("degraded: {}", result.failed_entities.join(", "));
        for entity in result.per_entity.iter().filter(|e| e.degraded) {
            for error in &entity.errors {
                eprintln!("  {}: {}", entity.entity_id, error);
            }
        }
    }
    Ok(())
}

pub fn timeline(timeline: &EntityTimeline, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(timeline);
    }

    println!("{}", timeline.entity_id);
    rows(&timeline.series);
    println!();
    comparison(&timeline.comparison);

    for error in &timeline.errors {
        eprintln!("degraded: {}", error);
    }
    Ok(())
}

pub fn retention(report: &RetentionReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let cohort = report.series.value_at(0);
    println!("{:<8} {:<20} {:>10} {:>8}", "Day", "Date", "Retained", "% d0");
    println!("{}", "-".repeat(49));
    for (day, point) in report.series.points.iter().enumerate() {
        println!(
            "{:<8} {:<20} {:>10} {:>8}",
            format!("d{}", day),
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.retention,
            percent_of_cohort(point.retention, cohort)
        );
    }

    if let Some(error) = &report.error {
        eprintln!("degraded: {}", error);
    }
    Ok(())
}

fn rows(series: &[TimelineRow]) {
    if series.is_empty() {
        println!("(no data)");
        return;
    }

    println!(
        "{:<20} {:>10} {:>10} {:>12} {:>10}",
        "Date", "DAU", "New", "Revenue", "Retention"
    );
    println!("{}", "-".repeat(66));
    for row in series {
        println!(
            "{:<20} {:>10.0} {:>10.0} {:>12.2} {:>10}",
            row.timestamp.format("%Y-%m-%d %H:%M"),
            row.dau,
            row.new_users,
            row.revenue,
            row.retention
        );
    }
}

fn comparison(comparison: &Comparison) {
    println!("Comparison:");
    for (label, data) in [
        ("DAU", &comparison.dau),
        ("New users", &comparison.new_users),
        ("Revenue", &comparison.revenue),
    ] {
        println!(
            "  {:<10} Current: {:.2}  Previous: {:.2}  Change: {:+.2} ({:+.1}%)",
            label, data.current_total, data.previous_total, data.change, data.percent_change
        );
    }
}
