//! One collector run: poll the API, merge into the store, stamp the update time.
//!
//! Fetch problems are logged and reported but never abort the run; only local IO
//! failures do. Repeated runs are safe because the store upserts.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::{info, warn};

use crate::config::Settings;
use crate::data::cen::{CenClient, FetchError};
use crate::data::http::Transport;
use crate::domain::Dataset;
use crate::error::AppError;
use crate::io::store::{Store, UpsertSummary};

/// Programmed data is requested for `today - 3 .. today - 1`.
pub const PROGRAMMED_LOOKBACK_DAYS: i64 = 3;

/// What happened to one dataset during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRun {
    pub dataset: Dataset,
    /// Date range that produced the stored rows (for Online, the first date with data).
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub fetched: usize,
    pub stored: Option<UpsertSummary>,
    pub errors: Vec<FetchError>,
}

impl DatasetRun {
    fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            range: None,
            fetched: 0,
            stored: None,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectReport {
    pub online: DatasetRun,
    pub programmed: DatasetRun,
    pub finished_at: DateTime<Utc>,
}

impl CollectReport {
    pub fn has_errors(&self) -> bool {
        !self.online.errors.is_empty() || !self.programmed.errors.is_empty()
    }
}

/// Run the collector once against `client` and `store`.
pub fn run_collect<T: Transport>(
    client: &CenClient<T>,
    store: &Store,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<CollectReport, AppError> {
    store.ensure_dir()?;
    let today = now.date_naive();

    let online = collect_online(client, store, settings, today, now)?;
    let programmed = collect_programmed(client, store, settings, today, now)?;

    store.write_last_updated(now)?;
    info!(at = %now.format("%Y-%m-%d %H:%M:%S"), "Collector run finished");

    Ok(CollectReport {
        online,
        programmed,
        finished_at: now,
    })
}

/// The Online endpoint only serves recent data: try today, then yesterday, and keep the
/// first date that yields rows for known stations.
fn collect_online<T: Transport>(
    client: &CenClient<T>,
    store: &Store,
    settings: &Settings,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DatasetRun, AppError> {
    let mut run = DatasetRun::new(Dataset::Online);
    let candidates = [today, today - TimeDelta::days(1)];

    for date in candidates {
        info!(%date, "Fetching CMg Online");
        let outcome = client.fetch_online(date, date, &settings.stations, settings.station_match);
        if let Some(err) = outcome.error {
            run.errors.push(err);
        }
        if outcome.records.is_empty() {
            warn!(%date, "No CMg Online rows for date");
            continue;
        }

        run.range = Some((date, date));
        run.fetched = outcome.records.len();
        run.stored = Some(store.upsert(outcome.records, now, settings.retention_days)?);
        return Ok(run);
    }

    warn!("No CMg Online data for any candidate date");
    Ok(run)
}

fn collect_programmed<T: Transport>(
    client: &CenClient<T>,
    store: &Store,
    settings: &Settings,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DatasetRun, AppError> {
    let mut run = DatasetRun::new(Dataset::Programmed);
    let start = today - TimeDelta::days(PROGRAMMED_LOOKBACK_DAYS);
    let end = today - TimeDelta::days(1);

    info!(%start, %end, "Fetching CMg Programmed");
    let outcome = client.fetch_programmed(start, end, &settings.stations);
    if let Some(err) = outcome.error {
        run.errors.push(err);
    }
    if outcome.records.is_empty() {
        warn!(%start, %end, "No CMg Programmed rows");
        return Ok(run);
    }

    run.range = Some((start, end));
    run.fetched = outcome.records.len();
    run.stored = Some(store.upsert(outcome.records, now, settings.retention_days)?);
    Ok(run)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::data::cen::tests::{ScriptedTransport, fast_settings, ok, online_row, status};
    use crate::domain::{OnlineRecord, ProgrammedRecord};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 11, 12, 0, 0).unwrap()
    }

    #[test]
    fn falls_back_to_yesterday_and_stores_both_datasets() {
        let transport = ScriptedTransport::new(vec![
            // Online, today: nothing yet.
            ok(json!({ "data": [] })),
            // Online, yesterday.
            ok(json!({ "data": [
                online_row("2025-03-10", 10, 0, "CHARRUA_______220", 40.0),
                online_row("2025-03-10", 10, 15, "CHARRUA_______220", 42.0),
            ] })),
            // Programmed, 2025-03-08 .. 2025-03-10.
            ok(json!({ "data": [
                { "fecha_hora": "2025-03-10 10:00:00", "llave_cmg": "Charrua220", "cmg_usd_mwh": 39.0 },
            ] })),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            ..fast_settings(500)
        };
        let client = CenClient::with_transport(transport, &settings).unwrap();
        let store = Store::new(dir.path());

        let report = run_collect(&client, &store, &settings, now()).unwrap();
        assert!(!report.has_errors());

        let d10 = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(report.online.range, Some((d10, d10)));
        assert_eq!(report.online.fetched, 2);
        assert_eq!(
            report.programmed.range,
            Some((NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(), d10))
        );

        let online: Vec<OnlineRecord> = store.load_all().unwrap();
        let programmed: Vec<ProgrammedRecord> = store.load_all().unwrap();
        assert_eq!(online.len(), 2);
        assert_eq!(programmed.len(), 1);
        assert_eq!(store.last_updated(), "2025-03-11 12:00:00");

        let requests = client_pages(&client);
        assert_eq!(requests, 3);
    }

    #[test]
    fn fetch_failures_do_not_abort_the_run() {
        let transport = ScriptedTransport::new(vec![status(403), status(403), status(404)]);
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            ..fast_settings(500)
        };
        let client = CenClient::with_transport(transport, &settings).unwrap();
        let store = Store::new(dir.path());

        let report = run_collect(&client, &store, &settings, now()).unwrap();
        assert!(report.has_errors());
        assert_eq!(report.online.errors.len(), 2);
        assert_eq!(report.programmed.errors.len(), 1);
        assert!(report.online.stored.is_none());
        assert!(!store.dir().join("cmg_online.csv").exists());
        assert_eq!(store.last_updated(), "2025-03-11 12:00:00");
    }

    fn client_pages(client: &CenClient<ScriptedTransport>) -> usize {
        client.transport().requests.borrow().len()
    }
}
