//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - realized hourly average: `o`
//! - programmed value: `-` line

use chrono::{DateTime, Utc};

use crate::domain::ComparisonRow;

/// Render realized vs programmed over time for one station.
pub fn render_comparison_plot(rows: &[ComparisonRow], width: usize, height: usize) -> String {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return "Plot: no data\n".to_string();
    };

    let width = width.max(10);
    let height = height.max(5);

    let t_min = 0.0;
    let t_max = hours_between(first.hour, last.hour).max(1.0);

    let (y_min, y_max) = y_range(rows).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Programmed first so realized points overlay it.
    let programmed: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| (hours_between(first.hour, r.hour), r.programmed))
        .collect();
    draw_curve(&mut grid, &programmed, t_min, t_max, y_min, y_max);

    for r in rows {
        let x = map_x(hours_between(first.hour, r.hour), t_min, t_max, width);
        let y = map_y(r.realized, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} → {} | y=[{y_min:.2}, {y_max:.2}] USD/MWh | o real, - programmed\n",
        first.hour.format("%m-%d %H:%M"),
        last.hour.format("%m-%d %H:%M"),
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

fn y_range(rows: &[ComparisonRow]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for r in rows {
        min_y = min_y.min(r.realized).min(r.programmed);
        max_y = max_y.max(r.realized).max(r.programmed);
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() {
        // Flat series: give it a unit band.
        Some((min_y - 0.5, min_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
