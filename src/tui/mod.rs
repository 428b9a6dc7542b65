//! Ratatui-based dashboard.
//!
//! A station list on the left; on the right the hourly comparison chart (real and
//! programmed lines over deviation bars), a deviation histogram, the raw 15-minute
//! series and the first rows of both raw datasets. Loads go through the presenter
//! cache; `r` clears it.

use std::io;
use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, List, ListItem, Paragraph, Row, Table},
};
use tracing::{error, info};

use crate::analysis::{Comparison, DEFAULT_HISTOGRAM_BINS, histogram};
use crate::app::pipeline::{LoadedData, Loader, StationReport};
use crate::domain::{ComparisonRow, DateRange, Station};
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::{CmgPlottersChart, PROGRAMMED_COLOR, REALIZED_COLOR, Series};

/// Raw tables show at most this many rows per dataset.
pub const RAW_TABLE_ROWS: usize = 100;

/// Start the dashboard.
pub fn run(loader: Loader, range: DateRange) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(loader, range);
    app.reload();
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    loader: Loader,
    range: DateRange,
    selected: usize,
    status: String,
    data: Option<LoadedData>,
    report: Option<StationReport>,
}

impl App {
    fn new(loader: Loader, range: DateRange) -> Self {
        Self {
            loader,
            range,
            selected: 0,
            status: "Loading...".to_string(),
            data: None,
            report: None,
        }
    }

    fn station(&self) -> Option<&Station> {
        self.loader.stations().get(self.selected)
    }

    /// Load the current range (cached) and rebuild the selected station's report.
    fn reload(&mut self) {
        match self.loader.load(self.range) {
            Ok(data) => {
                self.status = if data.is_empty() {
                    format!("no data for {}", self.range)
                } else {
                    format!(
                        "{} online / {} programmed records",
                        data.online.len(),
                        data.programmed.len()
                    )
                };
                self.data = Some(data);
            }
            Err(err) => {
                error!(error = %err, range = %self.range, "Dashboard load failed");
                self.status = err.message().to_string();
                self.data = None;
            }
        }
        self.rebuild_report();
    }

    fn rebuild_report(&mut self) {
        let report = match (&self.data, self.station()) {
            (Some(data), Some(station)) => Some(data.report(station)),
            _ => None,
        };
        self.report = report;
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                if self.selected > 0 {
                    self.selected -= 1;
                    self.rebuild_report();
                }
            }
            KeyCode::Down => {
                if self.selected + 1 < self.loader.stations().len() {
                    self.selected += 1;
                    self.rebuild_report();
                }
            }
            KeyCode::Left => self.shift_range(-1),
            KeyCode::Right => self.shift_range(1),
            KeyCode::Char('r') => {
                self.loader.refresh();
                self.reload();
                info!(range = %self.range, "Manual refresh");
            }
            _ => {}
        }
        false
    }

    fn shift_range(&mut self, days: i64) {
        let delta = TimeDelta::days(days);
        if let Some(range) = DateRange::new(self.range.start + delta, self.range.end + delta) {
            self.range = range;
            self.reload();
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        let source = if self.loader.is_live() { "live API" } else { "CSV store" };
        lines.push(Line::from(vec![
            Span::styled("cmg", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | CMg real vs programmed | {} | {source}", self.range)),
        ]));

        let Some(report) = &self.report else {
            lines.push(Line::from(Span::styled("no data", Style::default().fg(Color::Yellow))));
            let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
            frame.render_widget(p, area);
            return;
        };

        lines.push(Line::from(Span::styled(
            format!(
                "{} | online {} records (15 min) | programmed {} records (hourly)",
                report.station.display_name(),
                report.availability.online,
                report.availability.programmed,
            ),
            Style::default().fg(Color::Gray),
        )));

        let kpis = match &report.comparison {
            Comparison::Ready { summary, .. } => Span::styled(
                format!(
                    "hours {} | mean diff {} | MAE {:.1} | max |diff| {:.1} USD/MWh | real > prog {:.1}%",
                    summary.hours,
                    crate::report::fmt_signed(summary.mean_difference),
                    summary.mean_abs_difference,
                    summary.max_abs_difference,
                    summary.share_realized_above * 100.0,
                ),
                Style::default().fg(Color::Gray),
            ),
            Comparison::Empty(reason) => Span::styled(reason.message(), Style::default().fg(Color::Yellow)),
        };
        lines.push(Line::from(kpis));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(24), Constraint::Min(0)])
            .split(area);

        self.draw_stations(frame, columns[0]);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(30), Constraint::Min(0)])
            .split(columns[1]);

        self.draw_comparison(frame, rows[0]);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[1]);
        self.draw_histogram(frame, middle[0]);
        self.draw_raw_series(frame, middle[1]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        self.draw_online_table(frame, bottom[0]);
        self.draw_programmed_table(frame, bottom[1]);
    }

    fn draw_stations(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .loader
            .stations()
            .stations()
            .iter()
            .map(|s| ListItem::new(s.display_name()))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Stations").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_comparison(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title("Hourly: real (cyan) vs programmed (yellow), deviation bars")
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let rows = match self.report.as_ref().map(|r| &r.comparison) {
            Some(Comparison::Ready { rows, .. }) => rows,
            Some(Comparison::Empty(reason)) => {
                draw_message(frame, inner, reason.message());
                return;
            }
            None => {
                draw_message(frame, inner, "no data");
                return;
            }
        };

        let series = comparison_series(rows);
        let widget = CmgPlottersChart {
            lines: vec![
                Series {
                    points: &series.programmed,
                    color: PROGRAMMED_COLOR,
                },
                Series {
                    points: &series.realized,
                    color: REALIZED_COLOR,
                },
            ],
            bars: &series.deviations,
            bar_half_width: 3600.0 * 0.35,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: "hour (UTC)",
            y_label: "USD/MWh".to_string(),
            fmt_x: fmt_axis_time,
            fmt_y: fmt_axis_value,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_histogram(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = self.report.as_ref().map(|r| r.comparison.rows()).unwrap_or_default();
        let differences: Vec<f64> = rows.iter().map(|r| r.difference).collect();
        let bins = histogram(&differences, DEFAULT_HISTOGRAM_BINS);

        let title = match (bins.first(), bins.last()) {
            (Some(first), Some(last)) => format!("Deviation histogram [{:.1}, {:.1}]", first.lo, last.hi),
            _ => "Deviation histogram".to_string(),
        };
        let block = Block::default().title(title).borders(Borders::ALL);

        if bins.is_empty() {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            draw_message(frame, inner, "no data");
            return;
        }

        let inner_width = area.width.saturating_sub(2) as usize;
        let bar_width = (inner_width / bins.len()).max(1) as u16;
        let bars: Vec<Bar> = bins
            .iter()
            .map(|b| Bar::default().value(b.count as u64).text_value(String::new()))
            .collect();

        let chart = BarChart::default()
            .block(block)
            .bar_width(bar_width)
            .bar_gap(0)
            .bar_style(Style::default().fg(Color::Magenta))
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }

    fn draw_raw_series(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("15-minute real vs hourly programmed").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let (Some(data), Some(station)) = (&self.data, self.station()) else {
            draw_message(frame, inner, "no data");
            return;
        };

        let online: Vec<(f64, f64)> = data
            .online_for(station)
            .iter()
            .map(|r| (r.datetime.timestamp() as f64, r.cmg_usd_mwh))
            .collect();
        let programmed: Vec<(f64, f64)> = data
            .programmed_for(station)
            .iter()
            .map(|r| (r.datetime.timestamp() as f64, r.cmg_usd_mwh))
            .collect();
        if online.is_empty() && programmed.is_empty() {
            draw_message(frame, inner, "no data");
            return;
        }

        let Some((x_bounds, y_bounds)) = series_bounds(online.iter().chain(programmed.iter()).copied(), false) else {
            draw_message(frame, inner, "no data");
            return;
        };

        let widget = CmgPlottersChart {
            lines: vec![
                Series {
                    points: &programmed,
                    color: PROGRAMMED_COLOR,
                },
                Series {
                    points: &online,
                    color: REALIZED_COLOR,
                },
            ],
            bars: &[],
            bar_half_width: 0.0,
            x_bounds,
            y_bounds,
            x_label: "time (UTC)",
            y_label: "USD/MWh".to_string(),
            fmt_x: fmt_axis_time,
            fmt_y: fmt_axis_value,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_online_table(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows: Vec<Row> = match (&self.data, self.station()) {
            (Some(data), Some(station)) => data
                .online_for(station)
                .into_iter()
                .take(RAW_TABLE_ROWS)
                .map(|r| {
                    Row::new(vec![
                        r.datetime.format("%Y-%m-%d %H:%M").to_string(),
                        format!("{:.3}", r.cmg_usd_mwh),
                        r.cmg_clp_kwh.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string()),
                    ])
                })
                .collect(),
            _ => Vec::new(),
        };
        let table = Table::new(rows, [Constraint::Length(16), Constraint::Length(10), Constraint::Length(10)])
            .header(header_row(&["time", "USD/MWh", "CLP/kWh"]))
            .block(Block::default().title("Online (raw)").borders(Borders::ALL));
        frame.render_widget(table, area);
    }

    fn draw_programmed_table(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows: Vec<Row> = match (&self.data, self.station()) {
            (Some(data), Some(station)) => data
                .programmed_for(station)
                .into_iter()
                .take(RAW_TABLE_ROWS)
                .map(|r| {
                    Row::new(vec![
                        r.datetime.format("%Y-%m-%d %H:%M").to_string(),
                        format!("{:.3}", r.cmg_usd_mwh),
                        r.zone.clone().unwrap_or_else(|| "-".to_string()),
                    ])
                })
                .collect(),
            _ => Vec::new(),
        };
        let table = Table::new(rows, [Constraint::Length(16), Constraint::Length(10), Constraint::Min(6)])
            .header(header_row(&["time", "USD/MWh", "zone"]))
            .block(Block::default().title("Programmed (raw)").borders(Borders::ALL));
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ station  ←/→ shift range  r refresh  q quit";
        let mut spans = vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::raw(format!("updated: {}", self.loader.last_updated())),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ];
        if let Some(notice) = self.loader.notices().last() {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(notice.as_str(), Style::default().fg(Color::Red)));
        }
        let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn draw_message(frame: &mut ratatui::Frame<'_>, area: Rect, msg: &str) {
    let p = Paragraph::new(msg.to_string())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default());
    frame.render_widget(p, area);
}

fn header_row(cells: &[&'static str]) -> Row<'static> {
    Row::new(cells.to_vec()).style(Style::default().add_modifier(Modifier::BOLD))
}

/// Chart-ready data for the hourly comparison.
#[derive(Debug, Clone, PartialEq)]
struct ComparisonSeries {
    realized: Vec<(f64, f64)>,
    programmed: Vec<(f64, f64)>,
    deviations: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

/// Build chart series for Plotters (x in Unix seconds).
fn comparison_series(rows: &[ComparisonRow]) -> ComparisonSeries {
    let x = |r: &ComparisonRow| r.hour.timestamp() as f64;
    let realized: Vec<(f64, f64)> = rows.iter().map(|r| (x(r), r.realized)).collect();
    let programmed: Vec<(f64, f64)> = rows.iter().map(|r| (x(r), r.programmed)).collect();
    let deviations: Vec<(f64, f64)> = rows.iter().map(|r| (x(r), r.difference)).collect();

    let all = realized
        .iter()
        .chain(programmed.iter())
        .chain(deviations.iter())
        .copied();
    let (x_bounds, y_bounds) = series_bounds(all, true).unwrap_or(([0.0, 3600.0], [0.0, 1.0]));

    ComparisonSeries {
        realized,
        programmed,
        deviations,
        x_bounds,
        y_bounds,
    }
}

/// Padded bounds over finite points; `include_zero` keeps the zero line in view.
fn series_bounds(points: impl Iterator<Item = (f64, f64)>, include_zero: bool) -> Option<([f64; 2], [f64; 2])> {
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = if include_zero {
        (0.0, 0.0)
    } else {
        (f64::INFINITY, f64::NEG_INFINITY)
    };

    for (x, y) in points {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if !(x_min.is_finite() && x_max.is_finite() && y_min.is_finite() && y_max.is_finite()) {
        return None;
    }

    // Half an hour either side keeps the outer bars inside the plot.
    let x_bounds = [x_min - 1800.0, x_max + 1800.0];

    if y_max <= y_min {
        y_min -= 0.5;
        y_max += 0.5;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);
    Some((x_bounds, [y_min - pad, y_max + pad]))
}

fn fmt_axis_time(v: f64) -> String {
    DateTime::from_timestamp(v as i64, 0)
        .map(|t| t.format("%d %H:%M").to_string())
        .unwrap_or_default()
}

fn fmt_axis_value(v: f64) -> String {
    format!("{v:.1}")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::analysis::comparison_row;

    #[test]
    fn comparison_bounds_cover_values_and_zero() {
        let h0 = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let h1 = Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap();
        let series = comparison_series(&[comparison_row(h0, 25.0, 20.0), comparison_row(h1, 30.0, 40.0)]);

        assert_eq!(series.deviations, vec![(h0.timestamp() as f64, 5.0), (h1.timestamp() as f64, -10.0)]);
        assert_eq!(series.x_bounds, [h0.timestamp() as f64 - 1800.0, h1.timestamp() as f64 + 1800.0]);
        assert!(series.y_bounds[0] < -10.0);
        assert!(series.y_bounds[1] > 40.0);
    }

    #[test]
    fn bounds_skip_non_finite_points() {
        assert!(series_bounds([(f64::NAN, 1.0)].into_iter(), false).is_none());
        let (_, y) = series_bounds([(0.0, 5.0), (3600.0, 5.0)].into_iter(), false).unwrap();
        assert!(y[0] < 5.0 && y[1] > 5.0);
    }

    #[test]
    fn time_ticks_are_wall_clock() {
        let t = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
        assert_eq!(fmt_axis_time(t.timestamp() as f64), "10 14:00");
    }
}
