//! Coordinador Eléctrico Nacional (CEN) public API integration.
//!
//! Both marginal-cost endpoints share the same shape: `GET <endpoint>?startDate=&endDate=
//! &user_key=&page=&limit=` returning `{ "data": [...] }`. This module walks the pages,
//! retries transient server errors, and converts upstream rows into domain records.
//!
//! Fetching never fails outright: every call returns what it managed to collect plus an
//! optional `FetchError` describing why it stopped early.

use std::thread::sleep;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::http::{ReqwestTransport, Transport};
use crate::domain::{Dataset, OnlineRecord, ProgrammedRecord, StationMap, StationMatch};
use crate::error::AppError;

/// Why a paginated fetch stopped before reaching the last page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("page {page}: server error {status} persisted after {attempts} attempts")]
    RetriesExhausted { page: usize, status: u16, attempts: usize },
    #[error("page {page}: request failed with status {status}")]
    Status { page: usize, status: u16 },
    #[error("page {page}: connection error: {message}")]
    Connection { page: usize, message: String },
    #[error("page {page}: malformed response: {message}")]
    Malformed { page: usize, message: String },
}

/// Records gathered by a fetch, plus the error that cut it short (if any).
#[derive(Debug, Clone)]
pub struct FetchOutcome<R> {
    pub records: Vec<R>,
    /// Pages that returned a usable payload.
    pub pages: usize,
    /// Upstream rows that could not be converted (bad timestamp, missing cost).
    pub skipped: usize,
    pub error: Option<FetchError>,
}

impl<R> FetchOutcome<R> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            pages: 0,
            skipped: 0,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    fn map_records<S>(self, f: impl FnOnce(Vec<R>) -> (Vec<S>, usize)) -> FetchOutcome<S> {
        let (records, skipped) = f(self.records);
        FetchOutcome {
            records,
            pages: self.pages,
            skipped: self.skipped + skipped,
            error: self.error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct CenClient<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    token: String,
    page_size: usize,
    backoff: Vec<Duration>,
    page_pause: Duration,
}

impl CenClient<ReqwestTransport> {
    /// Build the production client. Fails if no token is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let transport = ReqwestTransport::new(settings.request_timeout)?;
        Self::with_transport(transport, settings)
    }
}

impl<T: Transport> CenClient<T> {
    pub fn with_transport(transport: T, settings: &Settings) -> Result<Self, AppError> {
        let token = settings.require_token()?.to_string();
        Ok(Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token,
            page_size: settings.effective_page_size(),
            backoff: settings.backoff.clone(),
            page_pause: settings.page_pause,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every raw row of `dataset` between `start` and `end` (inclusive dates).
    pub fn fetch_paginated(&self, dataset: Dataset, start: NaiveDate, end: NaiveDate) -> FetchOutcome<Value> {
        let url = format!("{}{}", self.base_url, dataset.endpoint());
        let mut out = FetchOutcome::empty();
        let mut page = 1usize;

        loop {
            let rows = match self.fetch_page(&url, start, end, page) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(dataset = ?dataset, error = %err, records = out.records.len(), "Fetch stopped early");
                    out.error = Some(err);
                    break;
                }
            };
            out.pages += 1;

            let n = rows.len();
            debug!(dataset = ?dataset, page, rows = n, "Fetched page");
            if n == 0 {
                break;
            }
            out.records.extend(rows);
            if n < self.page_size {
                break;
            }

            page += 1;
            sleep(self.page_pause);
        }

        info!(dataset = ?dataset, pages = out.pages, records = out.records.len(), "Fetch finished");
        out
    }

    /// Fetch a single page, retrying server errors along the backoff schedule.
    fn fetch_page(&self, url: &str, start: NaiveDate, end: NaiveDate, page: usize) -> Result<Vec<Value>, FetchError> {
        let query = [
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
            ("user_key", self.token.clone()),
            ("page", page.to_string()),
            ("limit", self.page_size.to_string()),
        ];

        let attempts = self.backoff.len() + 1;
        let mut last_status = 0u16;

        for attempt in 0..attempts {
            if attempt > 0 {
                let wait = self.backoff[attempt - 1];
                info!(page, attempt = attempt + 1, wait_secs = wait.as_secs_f64(), "Retrying after server error");
                sleep(wait);
            }

            let resp = self.transport.get(url, &query).map_err(|e| FetchError::Connection {
                page,
                message: e.to_string(),
            })?;

            if resp.is_success() {
                let body: PageBody = serde_json::from_str(&resp.body).map_err(|e| FetchError::Malformed {
                    page,
                    message: e.to_string(),
                })?;
                return Ok(body.data);
            }

            if !resp.is_server_error() {
                return Err(FetchError::Status {
                    page,
                    status: resp.status,
                });
            }

            warn!(page, status = resp.status, attempt = attempt + 1, "Server error");
            last_status = resp.status;
        }

        Err(FetchError::RetriesExhausted {
            page,
            status: last_status,
            attempts,
        })
    }

    /// Fetch realized 15-minute costs and keep rows belonging to known stations.
    pub fn fetch_online(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        stations: &StationMap,
        mode: StationMatch,
    ) -> FetchOutcome<OnlineRecord> {
        self.fetch_paginated(Dataset::Online, start, end)
            .map_records(|rows| convert_rows(rows, |v| online_from_value(v, stations, mode)))
    }

    /// Fetch hourly programmed (PID) costs for known stations.
    pub fn fetch_programmed(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        stations: &StationMap,
    ) -> FetchOutcome<ProgrammedRecord> {
        self.fetch_paginated(Dataset::Programmed, start, end)
            .map_records(|rows| convert_rows(rows, |v| programmed_from_value(v, stations)))
    }
}

/// Outcome of converting one upstream row.
enum Converted<R> {
    Keep(R),
    /// Valid row for a station we do not track.
    Ignore,
    Invalid(String),
}

fn convert_rows<R>(rows: Vec<Value>, convert: impl Fn(Value) -> Converted<R>) -> (Vec<R>, usize) {
    let mut out = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match convert(row) {
            Converted::Keep(r) => out.push(r),
            Converted::Ignore => {}
            Converted::Invalid(reason) => {
                skipped += 1;
                debug!(reason = %reason, "Skipping upstream row");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "Skipped upstream rows that could not be parsed");
    }
    (out, skipped)
}

#[derive(Debug, Deserialize)]
struct OnlineRow {
    fecha: String,
    hra: Value,
    min: Value,
    #[serde(default)]
    barra_transf: String,
    #[serde(default)]
    barra_info: String,
    cmg_usd_mwh_: Value,
    #[serde(default)]
    cmg_clp_kwh_: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ProgrammedRow {
    fecha_hora: String,
    llave_cmg: String,
    #[serde(default)]
    nmb_barra_info: String,
    cmg_usd_mwh: Value,
    #[serde(default)]
    zona: Option<Value>,
    #[serde(default)]
    region: Option<Value>,
}

fn online_from_value(value: Value, stations: &StationMap, mode: StationMatch) -> Converted<OnlineRecord> {
    let row: OnlineRow = match serde_json::from_value(value) {
        Ok(row) => row,
        Err(e) => return Converted::Invalid(format!("online row: {e}")),
    };

    let Some(station) = stations.resolve_online(mode, &row.barra_transf, &row.barra_info) else {
        return Converted::Ignore;
    };

    let Some(datetime) = online_timestamp(&row.fecha, &row.hra, &row.min) else {
        return Converted::Invalid(format!("online timestamp fecha={} hra={} min={}", row.fecha, row.hra, row.min));
    };
    let Some(cost) = value_as_f64(&row.cmg_usd_mwh_) else {
        return Converted::Invalid(format!("online cost {}", row.cmg_usd_mwh_));
    };

    Converted::Keep(OnlineRecord {
        datetime,
        station_online: station.online_key.clone(),
        station_programmed: station.programmed_key.clone(),
        station_name: row.barra_info.trim().to_string(),
        cmg_usd_mwh: cost,
        cmg_clp_kwh: row.cmg_clp_kwh_.as_ref().and_then(value_as_f64),
    })
}

fn programmed_from_value(value: Value, stations: &StationMap) -> Converted<ProgrammedRecord> {
    let row: ProgrammedRow = match serde_json::from_value(value) {
        Ok(row) => row,
        Err(e) => return Converted::Invalid(format!("programmed row: {e}")),
    };

    let key = row.llave_cmg.trim();
    if stations.by_programmed_key(key).is_none() {
        return Converted::Ignore;
    }

    let Some(datetime) = parse_timestamp(&row.fecha_hora) else {
        return Converted::Invalid(format!("programmed timestamp {}", row.fecha_hora));
    };
    let Some(cost) = value_as_f64(&row.cmg_usd_mwh) else {
        return Converted::Invalid(format!("programmed cost {}", row.cmg_usd_mwh));
    };

    Converted::Keep(ProgrammedRecord {
        datetime,
        station_programmed: key.to_string(),
        station_name: row.nmb_barra_info.trim().to_string(),
        cmg_usd_mwh: cost,
        zone: row.zona.as_ref().and_then(value_as_text),
        region: row.region.as_ref().and_then(value_as_text),
    })
}

/// `fecha + hra hours + min minutes`, interpreted as UTC.
fn online_timestamp(fecha: &str, hra: &Value, min: &Value) -> Option<DateTime<Utc>> {
    let date = parse_date_prefix(fecha)?;
    let hours = value_as_offset(hra)?;
    let minutes = value_as_offset(min)?;
    let base = date.and_hms_opt(0, 0, 0)?;
    let dt = base
        .checked_add_signed(TimeDelta::try_hours(hours)?)?
        .checked_add_signed(TimeDelta::try_minutes(minutes)?)?;
    Some(dt.and_utc())
}

/// Whole hour/minute offset; anything outside `i32` is treated as garbage.
fn value_as_offset(v: &Value) -> Option<i64> {
    let n = value_as_f64(v)?.trunc();
    (n.abs() <= f64::from(i32::MAX)).then_some(n as i64)
}

fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parse the timestamp formats the API is known to emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const FMTS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
    for fmt in FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    None
}

/// Numbers sometimes arrive as JSON strings.
fn value_as_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
