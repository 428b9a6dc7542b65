//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by the API client
//! - persisted to (and reloaded from) the CSV store
//! - aligned and summarized by the analysis code

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The two logical datasets published by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// Realized marginal cost, 15-minute resolution.
    Online,
    /// Forecast (PID) marginal cost, hourly resolution.
    Programmed,
}

impl Dataset {
    /// File name inside the data directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Dataset::Online => "cmg_online.csv",
            Dataset::Programmed => "cmg_programmed.csv",
        }
    }

    /// API path (relative to the base URL).
    pub fn endpoint(self) -> &'static str {
        match self {
            Dataset::Online => "/costo-marginal-online/v4/findByDate",
            Dataset::Programmed => "/cmg-programado-pid/v4/findByDate",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Dataset::Online => "CMg Online",
            Dataset::Programmed => "CMg Programmed (PID)",
        }
    }
}

/// A realized marginal-cost sample for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineRecord {
    pub datetime: DateTime<Utc>,
    /// Upstream `barra_transf` identifier (online naming scheme).
    pub station_online: String,
    /// Mapped `llave_cmg` identifier (programmed naming scheme).
    pub station_programmed: String,
    /// Upstream human-readable bus name (`barra_info`).
    pub station_name: String,
    pub cmg_usd_mwh: f64,
    pub cmg_clp_kwh: Option<f64>,
}

/// A forecast marginal-cost value for one station and hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammedRecord {
    pub datetime: DateTime<Utc>,
    /// Upstream `llave_cmg` identifier.
    pub station_programmed: String,
    /// Upstream human-readable bus name (`nmb_barra_info`).
    pub station_name: String,
    pub cmg_usd_mwh: f64,
    pub zone: Option<String>,
    pub region: Option<String>,
}

/// Common view over stored observations.
///
/// The store deduplicates and prunes on `(timestamp, station)`, so both record
/// kinds expose exactly that.
pub trait Observation {
    const DATASET: Dataset;

    fn timestamp(&self) -> DateTime<Utc>;

    /// Station identifier used as the second half of the storage key.
    fn station_key(&self) -> &str;

    fn date(&self) -> NaiveDate {
        self.timestamp().date_naive()
    }
}

impl Observation for OnlineRecord {
    const DATASET: Dataset = Dataset::Online;

    fn timestamp(&self) -> DateTime<Utc> {
        self.datetime
    }

    fn station_key(&self) -> &str {
        &self.station_online
    }
}

impl Observation for ProgrammedRecord {
    const DATASET: Dataset = Dataset::Programmed;

    fn timestamp(&self) -> DateTime<Utc> {
        self.datetime
    }

    fn station_key(&self) -> &str {
        &self.station_programmed
    }
}

/// One hour of the realized-vs-programmed comparison for a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub hour: DateTime<Utc>,
    /// Hourly mean of the 15-minute realized samples (USD/MWh).
    pub realized: f64,
    /// Programmed value for the hour (USD/MWh).
    pub programmed: f64,
    /// `realized - programmed`.
    pub difference: f64,
    /// `difference / programmed * 100`; NaN when `programmed == 0`.
    pub difference_pct: f64,
}

/// Inclusive calendar-date range used by the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {}", self.start, self.end)
    }
}
