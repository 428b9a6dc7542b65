//! Deviation statistics over merged comparison rows.
//!
//! Everything here is a pure function of the rows; nothing is cached separately.

use crate::domain::ComparisonRow;

pub const DEFAULT_HISTOGRAM_BINS: usize = 35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSummary {
    pub hours: usize,
    /// Mean of `realized - programmed` (USD/MWh).
    pub mean_difference: f64,
    /// Mean absolute difference (USD/MWh).
    pub mean_abs_difference: f64,
    pub max_abs_difference: f64,
    /// Fraction (0..=1) of hours where realized exceeded programmed.
    pub share_realized_above: f64,
}

impl ComparisonSummary {
    /// `None` for an empty row set.
    pub fn from_rows(rows: &[ComparisonRow]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let n = rows.len() as f64;
        let mut sum = 0.0;
        let mut sum_abs = 0.0;
        let mut max_abs = 0.0_f64;
        let mut above = 0usize;
        for r in rows {
            sum += r.difference;
            sum_abs += r.difference.abs();
            max_abs = max_abs.max(r.difference.abs());
            if r.difference > 0.0 {
                above += 1;
            }
        }
        Some(Self {
            hours: rows.len(),
            mean_difference: sum / n,
            mean_abs_difference: sum_abs / n,
            max_abs_difference: max_abs,
            share_realized_above: above as f64 / n,
        })
    }
}

/// One equal-width histogram bin `[lo, hi)` (the last bin is closed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Equal-width histogram of finite `values`.
///
/// When every value is identical a single bin centred on it is returned.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-12 {
        return vec![HistogramBin {
            lo: min - 0.5,
            hi: max + 0.5,
            count: finite.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lo: min + width * i as f64,
            hi: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for v in finite {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}
