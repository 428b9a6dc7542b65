//! Plain-text reports for the `compare`, `collect` and `stations` commands.

pub mod format;

pub use format::*;
