//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the alignment/statistics code stays clean and testable
//! - output changes are localized

use crate::analysis::{Comparison, ComparisonSummary};
use crate::app::collect::{CollectReport, DatasetRun};
use crate::app::pipeline::StationReport;
use crate::domain::{ComparisonRow, DateRange, StationMap};

/// Header block for a `compare` run.
pub fn format_run_header(range: DateRange, last_updated: &str, source: &str) -> String {
    let mut out = String::new();
    out.push_str("=== cmg - CMg Real vs Programmed ===\n");
    out.push_str(&format!("Range: {range}\n"));
    out.push_str(&format!("Source: {source} | data as of: {last_updated}\n"));
    out
}

/// Summary + merged table for one station.
pub fn format_station_report(report: &StationReport, show_table: bool) -> String {
    let mut out = String::new();
    let s = &report.station;
    out.push_str(&format!(
        "\n--- {} (online: {}, programmed: {}) ---\n",
        s.display_name(),
        s.online_key,
        s.programmed_key
    ));
    out.push_str(&format!(
        "Availability: online {} records (15 min) | programmed {} records (hourly)\n",
        report.availability.online, report.availability.programmed
    ));

    match &report.comparison {
        Comparison::Empty(reason) => {
            out.push_str(reason.message());
            out.push('\n');
        }
        Comparison::Ready { rows, summary } => {
            out.push_str(&format_summary(summary));
            if show_table {
                out.push('\n');
                out.push_str(&format_comparison_table(rows));
            }
        }
    }
    out
}

pub fn format_summary(summary: &ComparisonSummary) -> String {
    format!(
        "Hours: {} | mean diff: {} USD/MWh | MAE: {:.1} USD/MWh | max |diff|: {:.1} USD/MWh | real > prog: {:.1}%\n",
        summary.hours,
        fmt_signed(summary.mean_difference),
        summary.mean_abs_difference,
        summary.max_abs_difference,
        summary.share_realized_above * 100.0,
    )
}

/// Merged rows, values rounded to 3 decimals.
pub fn format_comparison_table(rows: &[ComparisonRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:>12} {:>12} {:>12} {:>10}\n",
            "hour", "real", "programmed", "diff", "diff %"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<12} {:-<12} {:-<12} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:<16} {:>12.3} {:>12.3} {:>12.3} {:>10}\n",
                r.hour.format("%Y-%m-%d %H:%M"),
                r.realized,
                r.programmed,
                r.difference,
                fmt_pct(r.difference_pct),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One line per station, for `compare` without `--station`.
pub fn format_overview(reports: &[StationReport]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>7} {:>7} {:>6} {:>10} {:>8} {:>8}\n",
            "station", "online", "prog", "hours", "mean diff", "MAE", "real>%"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<7} {:-<7} {:-<6} {:-<10} {:-<8} {:-<8}\n", "", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in reports {
        let name = truncate(&r.station.display_name(), 20);
        let line = match r.comparison.summary() {
            Some(s) => format!(
                "{:<20} {:>7} {:>7} {:>6} {:>10} {:>8.1} {:>8.1}",
                name,
                r.availability.online,
                r.availability.programmed,
                s.hours,
                fmt_signed(s.mean_difference),
                s.mean_abs_difference,
                s.share_realized_above * 100.0
            ),
            None => format!(
                "{:<20} {:>7} {:>7} {:>6} {:>10}",
                name, r.availability.online, r.availability.programmed, 0, "-"
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn format_stations(map: &StationMap) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<20} {:<20} {:<14} {}\n", "display", "online key", "programmed", "fragment"));
    for s in map.stations() {
        out.push_str(&format!(
            "{:<20} {:<20} {:<14} {}\n",
            s.display_name(),
            s.online_key,
            s.programmed_key,
            s.fragment
        ));
    }
    out
}

pub fn format_collect_report(report: &CollectReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== cmg collect @ {} UTC ===\n",
        report.finished_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format_dataset_run(&report.online));
    out.push_str(&format_dataset_run(&report.programmed));
    out
}

fn format_dataset_run(run: &DatasetRun) -> String {
    let mut out = String::new();
    let range = run
        .range
        .map(|(a, b)| if a == b { a.to_string() } else { format!("{a} → {b}") })
        .unwrap_or_else(|| "-".to_string());
    match &run.stored {
        Some(s) => out.push_str(&format!(
            "{}: {range} | fetched {} | stored {} (pruned {})\n",
            run.dataset.display_name(),
            run.fetched,
            s.stored,
            s.pruned
        )),
        None => out.push_str(&format!("{}: no data\n", run.dataset.display_name())),
    }
    for err in &run.errors {
        out.push_str(&format!("  ! {err}\n"));
    }
    out
}

pub fn fmt_signed(v: f64) -> String {
    format!("{v:+.1}")
}

pub fn fmt_pct(v: f64) -> String {
    if v.is_finite() { format!("{v:.3}") } else { "n/a".to_string() }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
