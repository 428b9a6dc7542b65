//! Input/output helpers.
//!
//! - CSV store with dedup + retention (`store`)
//! - comparison exports (`export`)

pub mod export;
pub mod store;

pub use export::*;
pub use store::*;
