//! `cmg-monitor` library crate.
//!
//! The binary (`cmg`) is a thin wrapper around this library so that:
//!
//! - the collector and the presenters share one fetch/align/store core
//! - core logic is testable without spawning processes or touching the network
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod plot;
pub mod report;
pub mod tui;
