//! Data acquisition.
//!
//! - blocking HTTP transport (`http`)
//! - CEN paginated client and upstream row conversion (`cen`)
//! - expiring presenter cache (`cache`)

pub mod cache;
pub mod cen;
pub mod http;

pub use cen::{CenClient, FetchError, FetchOutcome};
