//! Transfer planning.
//!
//! Turns detector decisions into concrete source → destination operations,
//! laid out in dated `YYYY/YYYY-MM-DD` directories.

mod types;
#[allow(clippy::module_inception)]
mod planner;

pub use types::*;
pub use planner::{with_disambiguator, TransferPlanner};
