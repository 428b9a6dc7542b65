//! Shared presenter pipeline used by both the `compare` command and the dashboard.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load (store or live API, cached) -> per-station alignment -> summary
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::time::Instant;

use tracing::{info, warn};

use crate::analysis::{Comparison, compare_station};
use crate::config::Settings;
use crate::data::cache::{LoadKey, TtlCache};
use crate::data::cen::{CenClient, FetchOutcome};
use crate::data::http::{ReqwestTransport, Transport};
use crate::domain::{Dataset, DateRange, OnlineRecord, ProgrammedRecord, Station, StationMap, StationMatch};
use crate::error::AppError;
use crate::io::store::Store;

/// Where the presenter reads observations from.
pub enum Source<T = ReqwestTransport> {
    /// The collector's CSV files.
    Stored(Store),
    /// Straight from the API, bypassing the store.
    Live(CenClient<T>),
}

/// Both datasets for one date range.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub range: DateRange,
    pub online: Vec<OnlineRecord>,
    pub programmed: Vec<ProgrammedRecord>,
}

/// Raw record counts for one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// 15-minute samples.
    pub online: usize,
    /// Hourly values.
    pub programmed: usize,
}

impl Availability {
    pub fn is_comparable(&self) -> bool {
        self.online > 0 && self.programmed > 0
    }
}

/// Everything the presenters show for one station.
#[derive(Debug, Clone)]
pub struct StationReport {
    pub station: Station,
    pub availability: Availability,
    pub comparison: Comparison,
}

impl LoadedData {
    /// Neither dataset has rows in the range.
    pub fn is_empty(&self) -> bool {
        self.online.is_empty() && self.programmed.is_empty()
    }

    pub fn availability(&self, station: &Station) -> Availability {
        Availability {
            online: self
                .online
                .iter()
                .filter(|r| r.station_online == station.online_key)
                .count(),
            programmed: self
                .programmed
                .iter()
                .filter(|r| r.station_programmed == station.programmed_key)
                .count(),
        }
    }

    pub fn compare(&self, station: &Station) -> Comparison {
        compare_station(&self.online, &self.programmed, station)
    }

    pub fn report(&self, station: &Station) -> StationReport {
        StationReport {
            station: station.clone(),
            availability: self.availability(station),
            comparison: self.compare(station),
        }
    }

    /// The station's 15-minute samples in time order.
    pub fn online_for(&self, station: &Station) -> Vec<&OnlineRecord> {
        let mut rows: Vec<&OnlineRecord> = self
            .online
            .iter()
            .filter(|r| r.station_online == station.online_key)
            .collect();
        rows.sort_by_key(|r| r.datetime);
        rows
    }

    pub fn programmed_for(&self, station: &Station) -> Vec<&ProgrammedRecord> {
        let mut rows: Vec<&ProgrammedRecord> = self
            .programmed
            .iter()
            .filter(|r| r.station_programmed == station.programmed_key)
            .collect();
        rows.sort_by_key(|r| r.datetime);
        rows
    }
}

/// Cached data loading for the presenters.
///
/// Calls are keyed by `(dataset, range)`; results expire after the configured TTL and
/// `refresh` drops everything.
pub struct Loader<T = ReqwestTransport> {
    source: Source<T>,
    stations: StationMap,
    station_match: StationMatch,
    online: TtlCache<LoadKey, Vec<OnlineRecord>>,
    programmed: TtlCache<LoadKey, Vec<ProgrammedRecord>>,
    store: Store,
    notices: Vec<String>,
}

impl Loader<ReqwestTransport> {
    pub fn from_settings(settings: &Settings, live: bool) -> Result<Self, AppError> {
        let source = if live {
            Source::Live(CenClient::from_settings(settings)?)
        } else {
            Source::Stored(Store::new(&settings.data_dir))
        };
        Ok(Self::new(source, settings))
    }
}

impl<T: Transport> Loader<T> {
    pub fn new(source: Source<T>, settings: &Settings) -> Self {
        Self {
            source,
            stations: settings.stations.clone(),
            station_match: settings.station_match,
            online: TtlCache::new(settings.cache_ttl),
            programmed: TtlCache::new(settings.cache_ttl),
            store: Store::new(&settings.data_dir),
            notices: Vec::new(),
        }
    }

    pub fn stations(&self) -> &StationMap {
        &self.stations
    }

    pub fn is_live(&self) -> bool {
        matches!(self.source, Source::Live(_))
    }

    /// Load both datasets for `range`, reusing fresh cache entries.
    pub fn load(&mut self, range: DateRange) -> Result<LoadedData, AppError> {
        let now = Instant::now();
        let online = self.load_online(range, now)?.to_vec();
        let programmed = self.load_programmed(range, now)?.to_vec();
        Ok(LoadedData {
            range,
            online,
            programmed,
        })
    }

    pub fn load_online(&mut self, range: DateRange, now: Instant) -> Result<&[OnlineRecord], AppError> {
        let key = LoadKey {
            dataset: Dataset::Online,
            range,
        };
        let (source, stations, mode, notices) = (&self.source, &self.stations, self.station_match, &mut self.notices);
        self.online
            .get_or_try_insert_with(key, now, || match source {
                Source::Stored(store) => store.load_range(range),
                Source::Live(client) => Ok(take_records(
                    Dataset::Online,
                    client.fetch_online(range.start, range.end, stations, mode),
                    notices,
                )),
            })
            .map(Vec::as_slice)
    }

    pub fn load_programmed(&mut self, range: DateRange, now: Instant) -> Result<&[ProgrammedRecord], AppError> {
        let key = LoadKey {
            dataset: Dataset::Programmed,
            range,
        };
        let (source, stations, notices) = (&self.source, &self.stations, &mut self.notices);
        self.programmed
            .get_or_try_insert_with(key, now, || match source {
                Source::Stored(store) => store.load_range(range),
                Source::Live(client) => Ok(take_records(
                    Dataset::Programmed,
                    client.fetch_programmed(range.start, range.end, stations),
                    notices,
                )),
            })
            .map(Vec::as_slice)
    }

    /// Drop every cached load (manual refresh).
    pub fn refresh(&mut self) {
        self.online.clear();
        self.programmed.clear();
        self.notices.clear();
        info!("Presenter caches cleared");
    }

    /// Fetch problems seen by live loads since the last refresh.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// "Last updated" stamp written by the collector.
    pub fn last_updated(&self) -> String {
        if self.is_live() {
            "live".to_string()
        } else {
            self.store.last_updated()
        }
    }
}

fn take_records<R>(dataset: Dataset, outcome: FetchOutcome<R>, notices: &mut Vec<String>) -> Vec<R> {
    if let Some(err) = &outcome.error {
        warn!(dataset = ?dataset, error = %err, records = outcome.records.len(), "Live load incomplete");
        notices.push(format!("{}: {err} (showing {} records)", dataset.display_name(), outcome.records.len()));
    }
    outcome.records
}
