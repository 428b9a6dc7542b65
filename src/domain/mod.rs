//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the two observation kinds (`OnlineRecord`, `ProgrammedRecord`) and the `Dataset` enum
//! - the station mapping between the two upstream naming schemes (`StationMap`)
//! - derived comparison rows (`ComparisonRow`)

pub mod stations;
pub mod types;

pub use stations::*;
pub use types::*;
