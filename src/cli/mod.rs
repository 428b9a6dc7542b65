//! Command-line parsing for the CMg collector and presenter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fetching/alignment code. Every connection setting can also come
//! from the environment (or `.env`).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cmg", version, about = "CMg Online vs Programmed collector and dashboard (CEN API)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch both datasets once and merge them into the CSV store.
    ///
    /// Meant to be scheduled (cron, systemd timer); repeated runs are safe.
    Collect(CollectArgs),
    /// Print per-station comparison summaries, optionally with a plot or CSV export.
    Compare(CompareArgs),
    /// Launch the interactive dashboard.
    Dashboard(PresentArgs),
    /// List the known stations and their identifiers.
    Stations,
}

/// Connection and storage options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// CEN API token.
    #[arg(long, env = "CEN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// CEN API base URL.
    #[arg(long, env = "CEN_BASE_URL", default_value = crate::config::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory holding the CSV store.
    #[arg(long, env = "CMG_DATA_DIR", default_value = crate::config::DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Records requested per page.
    #[arg(long, env = "CMG_PAGE_SIZE", default_value_t = crate::config::DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Also match Online rows by name fragment when the exact identifier is unknown.
    #[arg(long, env = "CMG_FUZZY_STATIONS")]
    pub fuzzy_stations: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Drop stored records older than this many days.
    #[arg(long, env = "CMG_RETENTION_DAYS", default_value_t = crate::config::DEFAULT_RETENTION_DAYS)]
    pub retention_days: u32,
}

/// Options for the presenters (`compare` and `dashboard`).
#[derive(Debug, Args, Clone)]
pub struct PresentArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// First day to show (YYYY-MM-DD). Defaults to yesterday.
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,

    /// Last day to show (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_name = "DATE")]
    pub end: Option<NaiveDate>,

    /// Read straight from the API instead of the CSV store.
    #[arg(long)]
    pub live: bool,

    /// Seconds a loaded dataset is reused before it is fetched again.
    #[arg(long, default_value_t = crate::config::DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub present: PresentArgs,

    /// Only this station (online key, programmed key or name fragment); prints its
    /// hourly table instead of the all-station overview.
    #[arg(short = 's', long)]
    pub station: Option<String>,

    /// Render an ASCII plot of real vs programmed (requires --station).
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export merged hourly rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_parses_dates_and_station() {
        let cli = Cli::parse_from([
            "cmg",
            "compare",
            "--start",
            "2025-03-01",
            "--end",
            "2025-03-02",
            "-s",
            "Charrua",
            "--data-dir",
            "/tmp/cmg",
        ]);
        let Command::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.present.start, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(args.station.as_deref(), Some("Charrua"));
        assert_eq!(args.present.source.data_dir, PathBuf::from("/tmp/cmg"));
        assert!(!args.present.live);
    }
}
