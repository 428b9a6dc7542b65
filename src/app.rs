//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - builds the immutable `Settings`
//! - runs the collector or one of the presenters

use std::time::Duration;

use chrono::{NaiveDate, TimeDelta, Utc};
use clap::Parser;
use tracing::{info, warn};

use crate::cli::{CollectArgs, Command, CompareArgs, PresentArgs, SourceArgs};
use crate::config::Settings;
use crate::data::cen::CenClient;
use crate::domain::{DateRange, StationMatch};
use crate::error::AppError;
use crate::io::store::Store;
use crate::logging::{LogTarget, init_tracing};

pub mod collect;
pub mod pipeline;

use pipeline::Loader;

/// Entry point for the `cmg` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    // We want a bare `cmg` (or `cmg --live`) to behave like `cmg dashboard ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Collect(args) => handle_collect(args),
        Command::Compare(args) => handle_compare(args),
        Command::Dashboard(args) => handle_dashboard(args),
        Command::Stations => handle_stations(),
    }
}

fn handle_collect(args: CollectArgs) -> Result<(), AppError> {
    let mut settings = settings_from_args(&args.source);
    settings.retention_days = args.retention_days;
    init_tracing(LogTarget::Stderr, &settings.data_dir)?;

    let client = CenClient::from_settings(&settings)?;
    let store = Store::new(&settings.data_dir);
    let report = collect::run_collect(&client, &store, &settings, Utc::now())?;

    print!("{}", crate::report::format_collect_report(&report));
    if report.has_errors() {
        warn!("Collector run finished with fetch errors");
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let settings = present_settings(&args.present);
    init_tracing(LogTarget::Stderr, &settings.data_dir)?;

    if args.plot && args.station.is_none() {
        return Err(AppError::new(2, "--plot needs a single station (use --station)."));
    }
    let station = match &args.station {
        Some(query) => Some(
            settings
                .stations
                .find(query)
                .cloned()
                .ok_or_else(|| AppError::new(2, format!("Unknown station '{query}'. See `cmg stations`.")))?,
        ),
        None => None,
    };

    let range = resolve_range(args.present.start, args.present.end, Utc::now().date_naive())?;
    let mut loader = Loader::from_settings(&settings, args.present.live)?;
    let data = loader.load(range)?;

    let source = if loader.is_live() { "live API" } else { "CSV store" };
    print!("{}", crate::report::format_run_header(range, &loader.last_updated(), source));
    for notice in loader.notices() {
        println!("! {notice}");
    }

    if data.is_empty() {
        println!("\nno data for {range} (run `cmg collect` first or try --live)");
        return Ok(());
    }

    let reports = match &station {
        Some(station) => {
            let report = data.report(station);
            print!("{}", crate::report::format_station_report(&report, true));
            if args.plot {
                println!();
                print!(
                    "{}",
                    crate::plot::render_comparison_plot(report.comparison.rows(), args.width, args.height)
                );
            }
            vec![report]
        }
        None => {
            let reports: Vec<_> = settings.stations.stations().iter().map(|s| data.report(s)).collect();
            println!();
            print!("{}", crate::report::format_overview(&reports));
            reports
        }
    };

    if let Some(path) = &args.export {
        let rows: Vec<_> = reports
            .iter()
            .filter(|r| !r.comparison.rows().is_empty())
            .map(|r| (&r.station, r.comparison.rows()))
            .collect();
        crate::io::export::write_comparison_csv(path, &rows)?;
        info!(path = %path.display(), stations = rows.len(), "Exported comparison rows");
    }

    Ok(())
}

fn handle_dashboard(args: PresentArgs) -> Result<(), AppError> {
    let settings = present_settings(&args);
    init_tracing(LogTarget::File, &settings.data_dir)?;

    let range = resolve_range(args.start, args.end, Utc::now().date_naive())?;
    let loader = Loader::from_settings(&settings, args.live)?;
    crate::tui::run(loader, range)
}

fn handle_stations() -> Result<(), AppError> {
    let settings = Settings::default();
    print!("{}", crate::report::format_stations(&settings.stations));
    Ok(())
}

/// Build runtime settings from the shared connection/storage flags.
pub fn settings_from_args(args: &SourceArgs) -> Settings {
    Settings {
        token: args.token.clone(),
        base_url: args.base_url.trim_end_matches('/').to_string(),
        data_dir: args.data_dir.clone(),
        page_size: args.page_size,
        station_match: if args.fuzzy_stations {
            StationMatch::Fragment
        } else {
            StationMatch::Exact
        },
        ..Settings::default()
    }
}

fn present_settings(args: &PresentArgs) -> Settings {
    Settings {
        cache_ttl: Duration::from_secs(args.cache_ttl_secs),
        ..settings_from_args(&args.source)
    }
}

/// Presenter date range; defaults to yesterday through today.
pub fn resolve_range(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Result<DateRange, AppError> {
    let end = end.unwrap_or(today);
    let start = start.unwrap_or_else(|| end - TimeDelta::days(1));
    DateRange::new(start, end)
        .ok_or_else(|| AppError::new(2, format!("Start date {start} is after end date {end}.")))
}

/// Rewrite argv so `cmg` defaults to `cmg dashboard`.
///
/// Rules:
/// - `cmg`                      -> `cmg dashboard`
/// - `cmg --live ...`           -> `cmg dashboard --live ...`
/// - `cmg --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("dashboard".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // If the first token is a flag, treat it as "dashboard flags".
    if arg1.starts_with('-') {
        argv.insert(1, "dashboard".to_string());
    }

    argv
}
