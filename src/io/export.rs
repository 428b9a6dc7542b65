//! Export merged comparison rows to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{ComparisonRow, Station};
use crate::error::AppError;

/// Write comparison rows for one or more stations to a CSV file.
pub fn write_comparison_csv(path: &Path, reports: &[(&Station, &[ComparisonRow])]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "station_online,station_programmed,hour,cmg_real_usd_mwh,cmg_programmed_usd_mwh,difference_usd_mwh,difference_pct"
    )
    .map_err(|e| AppError::new(4, format!("Failed to write export CSV header: {e}")))?;

    for (station, rows) in reports {
        for r in rows.iter() {
            writeln!(
                file,
                "{},{},{},{:.3},{:.3},{:.3},{}",
                station.online_key,
                station.programmed_key,
                r.hour.format("%Y-%m-%d %H:%M"),
                r.realized,
                r.programmed,
                r.difference,
                if r.difference_pct.is_finite() {
                    format!("{:.3}", r.difference_pct)
                } else {
                    String::new()
                },
            )
            .map_err(|e| AppError::new(4, format!("Failed to write export CSV row: {e}")))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::analysis::comparison_row;
    use crate::domain::StationMap;

    #[test]
    fn writes_one_line_per_row_and_blanks_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let map = StationMap::default();
        let station = &map.stations()[0];
        let hour = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let rows = vec![comparison_row(hour, 25.0, 20.0), comparison_row(hour, 5.0, 0.0)];

        write_comparison_csv(&path, &[(station, rows.as_slice())]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "P.MONTT_______220,PMontt220,2025-03-10 10:00,25.000,20.000,5.000,25.000");
        assert!(lines[2].ends_with(",5.000,"));
    }
}
