//! Run configuration.
//!
//! `Settings` is built once per process from CLI flags (which fall back to
//! environment variables and `.env`) and then passed by reference into the
//! client, the store and the presenter. Nothing here is mutated after start-up.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{StationMap, StationMatch};
use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://sipub.api.coordinador.cl:443";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Waits before the 2nd, 3rd and 4th attempt of a page that hit a 5xx.
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [10, 30, 60];

/// Pause between consecutive page requests.
pub const PAGE_PAUSE: Duration = Duration::from_secs(1);

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Settings {
    /// API secret (`CEN_TOKEN`). Only required when talking to the API.
    pub token: Option<String>,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub retention_days: u32,
    pub page_size: usize,
    pub backoff: Vec<Duration>,
    pub page_pause: Duration,
    pub request_timeout: Duration,
    pub station_match: StationMatch,
    pub stations: StationMap,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            retention_days: DEFAULT_RETENTION_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
            backoff: DEFAULT_BACKOFF_SECS.iter().map(|&s| Duration::from_secs(s)).collect(),
            page_pause: PAGE_PAUSE,
            request_timeout: REQUEST_TIMEOUT,
            station_match: StationMatch::Exact,
            stations: StationMap::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl Settings {
    /// The API token, or a fatal configuration error.
    pub fn require_token(&self) -> Result<&str, AppError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::new(
                    2,
                    "Missing CEN_TOKEN. Set it in the environment (or .env) or pass --token.",
                )
            })
    }

    /// Page size clamped to at least one record.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_rejected() {
        let mut settings = Settings::default();
        assert_eq!(settings.require_token().unwrap_err().exit_code(), 2);

        settings.token = Some("   ".to_string());
        assert!(settings.require_token().is_err());

        settings.token = Some(" abc ".to_string());
        assert_eq!(settings.require_token().unwrap(), "abc");
    }

    #[test]
    fn defaults_allow_four_attempts() {
        let settings = Settings::default();
        assert_eq!(settings.backoff.len() + 1, 4);
        assert_eq!(settings.effective_page_size(), 500);
    }
}
