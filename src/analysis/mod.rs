//! Realized-vs-programmed alignment.
//!
//! The Online series is resampled to hourly means and inner-joined with the hourly
//! Programmed series of the mapped station. Hours missing on either side are dropped,
//! never imputed.

use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::domain::{ComparisonRow, OnlineRecord, ProgrammedRecord, Station};

pub mod stats;

pub use stats::*;

/// Why a station has no comparison rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    NoOnline,
    NoProgrammed,
    NoOverlap,
}

impl EmptyReason {
    pub fn message(self) -> &'static str {
        match self {
            EmptyReason::NoOnline => "No CMg Online data for this station in the selected range.",
            EmptyReason::NoProgrammed => "No CMg Programmed data for this station in the selected range.",
            EmptyReason::NoOverlap => "No common hours between CMg Online and CMg Programmed for this station.",
        }
    }
}

/// Result of comparing one station.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Empty(EmptyReason),
    Ready {
        rows: Vec<ComparisonRow>,
        summary: ComparisonSummary,
    },
}

impl Comparison {
    pub fn rows(&self) -> &[ComparisonRow] {
        match self {
            Comparison::Empty(_) => &[],
            Comparison::Ready { rows, .. } => rows,
        }
    }

    pub fn summary(&self) -> Option<&ComparisonSummary> {
        match self {
            Comparison::Empty(_) => None,
            Comparison::Ready { summary, .. } => Some(summary),
        }
    }
}

/// Truncate a timestamp to the start of its hour.
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts)
}

/// Hourly mean of the station's 15-minute samples, keyed by hour.
///
/// Buckets with a single sample still produce a value; hours without samples are absent.
pub fn hourly_average(online: &[OnlineRecord], online_key: &str) -> BTreeMap<DateTime<Utc>, f64> {
    let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for r in online.iter().filter(|r| r.station_online == online_key) {
        let entry = buckets.entry(floor_to_hour(r.datetime)).or_insert((0.0, 0));
        entry.0 += r.cmg_usd_mwh;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(hour, (sum, n))| (hour, sum / n as f64))
        .collect()
}

/// Programmed values of the station keyed by hour. If two rows share an hour the later
/// one in input order wins.
pub fn hourly_programmed(programmed: &[ProgrammedRecord], programmed_key: &str) -> BTreeMap<DateTime<Utc>, f64> {
    programmed
        .iter()
        .filter(|r| r.station_programmed == programmed_key)
        .map(|r| (floor_to_hour(r.datetime), r.cmg_usd_mwh))
        .collect()
}

/// Inner-join two hourly series and derive the difference columns.
pub fn join_hourly(
    realized: &BTreeMap<DateTime<Utc>, f64>,
    programmed: &BTreeMap<DateTime<Utc>, f64>,
) -> Vec<ComparisonRow> {
    realized
        .iter()
        .filter_map(|(hour, &real)| {
            programmed.get(hour).map(|&prog| comparison_row(*hour, real, prog))
        })
        .collect()
}

pub fn comparison_row(hour: DateTime<Utc>, realized: f64, programmed: f64) -> ComparisonRow {
    let difference = realized - programmed;
    let difference_pct = if programmed == 0.0 {
        f64::NAN
    } else {
        difference / programmed * 100.0
    };
    ComparisonRow {
        hour,
        realized,
        programmed,
        difference,
        difference_pct,
    }
}

/// Align both series for `station` and summarize the deviations.
pub fn compare_station(online: &[OnlineRecord], programmed: &[ProgrammedRecord], station: &Station) -> Comparison {
    let realized = hourly_average(online, &station.online_key);
    if realized.is_empty() {
        return Comparison::Empty(EmptyReason::NoOnline);
    }
    let forecast = hourly_programmed(programmed, &station.programmed_key);
    if forecast.is_empty() {
        return Comparison::Empty(EmptyReason::NoProgrammed);
    }

    let rows = join_hourly(&realized, &forecast);
    match ComparisonSummary::from_rows(&rows) {
        Some(summary) => Comparison::Ready { rows, summary },
        None => Comparison::Empty(EmptyReason::NoOverlap),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::StationMap;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn online(h: u32, m: u32, station: &Station, cost: f64) -> OnlineRecord {
        OnlineRecord {
            datetime: at(h, m),
            station_online: station.online_key.clone(),
            station_programmed: station.programmed_key.clone(),
            station_name: String::new(),
            cmg_usd_mwh: cost,
            cmg_clp_kwh: None,
        }
    }

    fn programmed(h: u32, station: &Station, cost: f64) -> ProgrammedRecord {
        ProgrammedRecord {
            datetime: at(h, 0),
            station_programmed: station.programmed_key.clone(),
            station_name: String::new(),
            cmg_usd_mwh: cost,
            zone: None,
            region: None,
        }
    }

    fn stations() -> (Station, Station) {
        let map = StationMap::default();
        (map.stations()[0].clone(), map.stations()[1].clone())
    }

    #[test]
    fn hourly_mean_of_four_quarters() {
        let (x, _) = stations();
        let rows = vec![
            online(10, 0, &x, 10.0),
            online(10, 15, &x, 20.0),
            online(10, 30, &x, 30.0),
            online(10, 45, &x, 40.0),
        ];
        let avg = hourly_average(&rows, &x.online_key);
        assert_eq!(avg.len(), 1);
        assert_eq!(avg[&at(10, 0)], 25.0);

        let cmp = compare_station(&rows, &[programmed(10, &x, 20.0)], &x);
        let row = cmp.rows()[0];
        assert_eq!(row.realized, 25.0);
        assert_eq!(row.difference, 5.0);
        assert!((row.difference_pct - 25.0).abs() < 1e-12);
    }

    #[test]
    fn partial_hours_and_other_stations() {
        let (x, y) = stations();
        let rows = vec![
            online(10, 0, &x, 10.0),
            online(11, 30, &x, 7.0),
            online(11, 45, &x, 9.0),
            online(10, 0, &y, 1000.0),
        ];
        let avg = hourly_average(&rows, &x.online_key);
        assert_eq!(avg.len(), 2);
        assert_eq!(avg[&at(10, 0)], 10.0);
        assert_eq!(avg[&at(11, 0)], 8.0);
        assert!(!avg.contains_key(&at(12, 0)));
    }

    #[test]
    fn join_is_strictly_inner() {
        let (x, y) = stations();
        let online_rows = vec![online(9, 0, &x, 1.0), online(10, 0, &x, 2.0), online(11, 0, &x, 3.0)];
        let programmed_rows = vec![
            programmed(10, &x, 2.0),
            programmed(11, &x, 1.0),
            programmed(12, &x, 5.0),
            programmed(9, &y, 5.0),
        ];

        let realized = hourly_average(&online_rows, &x.online_key);
        let forecast = hourly_programmed(&programmed_rows, &x.programmed_key);
        let rows = join_hourly(&realized, &forecast);

        assert!(rows.len() <= realized.len().min(forecast.len()));
        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert!(realized.contains_key(&r.hour));
            assert!(forecast.contains_key(&r.hour));
            assert_eq!(r.difference, r.realized - r.programmed);
        }
    }

    #[test]
    fn zero_programmed_gives_nan_percentage() {
        let row = comparison_row(at(10, 0), 12.0, 0.0);
        assert_eq!(row.difference, 12.0);
        assert!(row.difference_pct.is_nan());
    }

    #[test]
    fn empty_states_are_reported() {
        let (x, y) = stations();
        assert_eq!(compare_station(&[], &[programmed(10, &x, 1.0)], &x), Comparison::Empty(EmptyReason::NoOnline));
        assert_eq!(
            compare_station(&[online(10, 0, &x, 1.0)], &[programmed(10, &y, 1.0)], &x),
            Comparison::Empty(EmptyReason::NoProgrammed)
        );
        assert_eq!(
            compare_station(&[online(10, 0, &x, 1.0)], &[programmed(11, &x, 1.0)], &x),
            Comparison::Empty(EmptyReason::NoOverlap)
        );
    }

    #[test]
    fn floor_is_idempotent_on_hours() {
        assert_eq!(floor_to_hour(at(10, 45)), at(10, 0));
        assert_eq!(floor_to_hour(at(10, 0)), at(10, 0));
    }
}
