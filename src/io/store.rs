//! CSV-backed incremental storage.
//!
//! One file per dataset (`cmg_online.csv`, `cmg_programmed.csv`) plus a one-line
//! `last_updated.txt`. Writes go through a temporary file and a rename so a crashed run
//! never leaves a half-written CSV behind. There is no locking: at most one collector run
//! is expected to touch the files at a time.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::domain::{DateRange, Observation};
use crate::error::AppError;

pub const LAST_UPDATED_FILE: &str = "last_updated.txt";
pub const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Counts reported after an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSummary {
    pub existing: usize,
    pub incoming: usize,
    pub stored: usize,
    /// Records dropped because they fell outside the retention window.
    pub pruned: usize,
}

#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for<R: Observation>(&self) -> PathBuf {
        self.dir.join(R::DATASET.file_name())
    }

    pub fn ensure_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::new(4, format!("Failed to create data dir '{}': {e}", self.dir.display()))
        })
    }

    /// Load every stored record of a dataset. A missing file is an empty dataset.
    pub fn load_all<R: Observation + DeserializeOwned>(&self) -> Result<Vec<R>, AppError> {
        let path = self.path_for::<R>();
        if !path.exists() {
            debug!(path = %path.display(), "No stored file yet");
            return Ok(Vec::new());
        }

        let file = File::open(&path)
            .map_err(|e| AppError::new(4, format!("Failed to open '{}': {e}", path.display())))?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let mut out = Vec::new();
        let mut bad_rows = 0usize;
        for result in reader.deserialize::<R>() {
            match result {
                Ok(record) => out.push(record),
                Err(e) => {
                    bad_rows += 1;
                    debug!(path = %path.display(), error = %e, "Skipping unreadable row");
                }
            }
        }
        if bad_rows > 0 {
            warn!(path = %path.display(), bad_rows, "Skipped unreadable rows");
        }
        Ok(out)
    }

    /// Load stored records whose calendar date falls inside `range`.
    pub fn load_range<R: Observation + DeserializeOwned>(&self, range: DateRange) -> Result<Vec<R>, AppError> {
        let mut records = self.load_all::<R>()?;
        records.retain(|r| range.contains(r.date()));
        Ok(records)
    }

    /// Replace the dataset file with `records`.
    pub fn write_all<R: Observation + Serialize>(&self, records: &[R]) -> Result<(), AppError> {
        self.ensure_dir()?;
        let path = self.path_for::<R>();
        let tmp = path.with_extension("csv.tmp");

        let mut writer = csv::Writer::from_path(&tmp)
            .map_err(|e| AppError::new(4, format!("Failed to create '{}': {e}", tmp.display())))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", tmp.display())))?;
        }
        writer
            .flush()
            .map_err(|e| AppError::new(4, format!("Failed to flush '{}': {e}", tmp.display())))?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(|e| {
            AppError::new(4, format!("Failed to replace '{}': {e}", path.display()))
        })
    }

    /// Merge `incoming` into the stored dataset, dedup, sort, prune and persist.
    pub fn upsert<R>(&self, incoming: Vec<R>, now: DateTime<Utc>, retention_days: u32) -> Result<UpsertSummary, AppError>
    where
        R: Observation + Serialize + DeserializeOwned,
    {
        let existing = self.load_all::<R>()?;
        let n_existing = existing.len();
        let n_incoming = incoming.len();

        let cutoff = retention_cutoff(now, retention_days);
        let (merged, pruned) = merge_records(existing, incoming, cutoff);
        self.write_all(&merged)?;

        let summary = UpsertSummary {
            existing: n_existing,
            incoming: n_incoming,
            stored: merged.len(),
            pruned,
        };
        info!(
            path = %self.path_for::<R>().display(),
            existing = summary.existing,
            incoming = summary.incoming,
            stored = summary.stored,
            pruned = summary.pruned,
            "Dataset updated"
        );
        Ok(summary)
    }

    pub fn write_last_updated(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.ensure_dir()?;
        let path = self.dir.join(LAST_UPDATED_FILE);
        fs::write(&path, now.format(LAST_UPDATED_FORMAT).to_string())
            .map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", path.display())))
    }

    /// The stored "last updated" stamp, or `"unknown"`.
    pub fn last_updated(&self) -> String {
        fs::read_to_string(self.dir.join(LAST_UPDATED_FILE))
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Oldest timestamp kept by a prune at `now`.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    now - TimeDelta::days(i64::from(retention_days))
}

/// Concatenate, keep the last value per `(timestamp, station)`, sort by that key and drop
/// anything older than `cutoff`. Returns the merged records and how many were pruned.
pub fn merge_records<R: Observation>(existing: Vec<R>, incoming: Vec<R>, cutoff: DateTime<Utc>) -> (Vec<R>, usize) {
    let mut by_key: BTreeMap<(DateTime<Utc>, String), R> = BTreeMap::new();
    for record in existing.into_iter().chain(incoming) {
        by_key.insert((record.timestamp(), record.station_key().to_string()), record);
    }

    let total = by_key.len();
    let kept: Vec<R> = by_key
        .into_values()
        .filter(|r| r.timestamp() >= cutoff)
        .collect();
    let pruned = total - kept.len();
    (kept, pruned)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::domain::{OnlineRecord, ProgrammedRecord};

    fn online(h: u32, m: u32, station: &str, cost: f64) -> OnlineRecord {
        OnlineRecord {
            datetime: Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap(),
            station_online: station.to_string(),
            station_programmed: "X220".to_string(),
            station_name: format!("BA {station}"),
            cmg_usd_mwh: cost,
            cmg_clp_kwh: None,
        }
    }

    fn programmed(day: u32, h: u32, cost: f64) -> ProgrammedRecord {
        ProgrammedRecord {
            datetime: Utc.with_ymd_and_hms(2025, 3, day, h, 0, 0).unwrap(),
            station_programmed: "Charrua220".to_string(),
            station_name: "BA S/E CHARRUA 220KV".to_string(),
            cmg_usd_mwh: cost,
            zone: Some("Sur".to_string()),
            region: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap()
    }

    #[test]
    fn last_seen_value_wins_and_output_is_sorted() {
        let existing = vec![online(10, 15, "B", 1.0), online(10, 0, "A", 2.0)];
        let incoming = vec![online(10, 0, "A", 3.0), online(9, 45, "A", 4.0)];

        let (merged, pruned) = merge_records(existing, incoming, now() - TimeDelta::days(7));
        assert_eq!(pruned, 0);
        let costs: Vec<f64> = merged.iter().map(|r| r.cmg_usd_mwh).collect();
        assert_eq!(costs, vec![4.0, 3.0, 1.0]);
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![online(10, 0, "A", 1.0), online(10, 15, "A", 2.0)];
        let cutoff = now() - TimeDelta::days(7);

        let (once, _) = merge_records(Vec::new(), batch.clone(), cutoff);
        let (twice, _) = merge_records(once.clone(), batch, cutoff);
        assert_eq!(once, twice);
    }

    #[test]
    fn retention_drops_old_records() {
        let cutoff = retention_cutoff(now(), 1);
        let (kept, pruned) = merge_records(
            vec![programmed(9, 23, 1.0), programmed(10, 0, 2.0), programmed(10, 1, 3.0)],
            Vec::new(),
            cutoff,
        );
        assert_eq!(pruned, 1);
        assert!(kept.iter().all(|r| r.datetime >= cutoff));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn upsert_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("data"));

        let first = store.upsert(vec![programmed(10, 5, 50.0)], now(), 7).unwrap();
        assert_eq!(first.stored, 1);

        let second = store
            .upsert(vec![programmed(10, 5, 55.0), programmed(10, 6, 60.0)], now(), 7)
            .unwrap();
        assert_eq!(second.existing, 1);
        assert_eq!(second.stored, 2);

        let loaded: Vec<ProgrammedRecord> = store.load_all().unwrap();
        assert_eq!(loaded, vec![programmed(10, 5, 55.0), programmed(10, 6, 60.0)]);
        assert!(!store.dir().join("cmg_programmed.csv.tmp").exists());
    }

    #[test]
    fn optional_fields_survive_csv() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut with_clp = online(10, 0, "A", 1.5);
        with_clp.cmg_clp_kwh = Some(1.234);
        let records = vec![with_clp, online(10, 15, "A", 2.5)];

        store.write_all(&records).unwrap();
        let loaded: Vec<OnlineRecord> = store.load_all().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn range_filter_is_inclusive_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store
            .write_all(&[programmed(8, 23, 1.0), programmed(9, 0, 2.0), programmed(10, 23, 3.0)])
            .unwrap();

        let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let range = DateRange::new(d(9), d(10)).unwrap();
        let loaded: Vec<ProgrammedRecord> = store.load_range(range).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("nope"));
        let loaded: Vec<OnlineRecord> = store.load_all().unwrap();
        assert!(loaded.is_empty());
        assert_eq!(store.last_updated(), "unknown");
    }

    #[test]
    fn last_updated_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store
            .write_last_updated(Utc.with_ymd_and_hms(2025, 3, 10, 7, 5, 9).unwrap())
            .unwrap();
        assert_eq!(store.last_updated(), "2025-03-10 07:05:09");
    }
}
