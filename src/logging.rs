//! Tracing subscriber set-up.
//!
//! Command-line runs log to stderr. The dashboard owns the terminal, so it logs to
//! `<data_dir>/dashboard.log` instead.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

pub const DASHBOARD_LOG_FILE: &str = "dashboard.log";

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Append to a file in the data directory.
    File,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber (`RUST_LOG` filter, default `info`).
///
/// A second call is a no-op.
pub fn init_tracing(target: LogTarget, data_dir: &Path) -> Result<(), AppError> {
    match target {
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogTarget::File => {
            std::fs::create_dir_all(data_dir).map_err(|e| {
                AppError::new(4, format!("Failed to create data dir '{}': {e}", data_dir.display()))
            })?;
            let path = data_dir.join(DASHBOARD_LOG_FILE);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| AppError::new(4, format!("Failed to open log file '{}': {e}", path.display())))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
    }
    Ok(())
}
