//! Plotters-powered time-series chart widget for Ratatui.
//!
//! Why Plotters instead of Ratatui's built-in `Chart` widget?
//! - nicer axis + mesh rendering
//! - less manual work for ticks/labels
//! - filled rectangles for the deviation bars
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters::style::Color as _;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

pub const REALIZED_COLOR: RGBColor = RGBColor(0, 255, 255); // cyan
pub const PROGRAMMED_COLOR: RGBColor = RGBColor(255, 255, 0); // yellow
const ABOVE_COLOR: RGBColor = RGBColor(255, 0, 0);
const BELOW_COLOR: RGBColor = RGBColor(0, 255, 0);

/// One line series.
pub struct Series<'a> {
    pub points: &'a [(f64, f64)],
    pub color: RGBColor,
}

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call; x values are Unix
/// seconds so tick labels can show wall-clock time.
pub struct CmgPlottersChart<'a> {
    pub lines: Vec<Series<'a>>,
    /// Deviation bars `(x, height)`, drawn from zero.
    pub bars: &'a [(f64, f64)],
    /// Half the bar width in x units.
    pub bar_half_width: f64,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: String,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl<'a> Widget for CmgPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(&self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            if !self.bars.is_empty() {
                if y0 < 0.0 && y1 > 0.0 {
                    chart.draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], &RGBColor(128, 128, 128)))?;
                }
                let w = self.bar_half_width;
                chart.draw_series(self.bars.iter().map(|&(x, h)| {
                    let color = if h >= 0.0 { ABOVE_COLOR } else { BELOW_COLOR };
                    Rectangle::new([(x - w, 0.0), (x + w, h)], color.filled())
                }))?;
            }

            // Lines last so they stay visible over the bars.
            for series in &self.lines {
                chart.draw_series(LineSeries::new(series.points.iter().copied(), &series.color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
