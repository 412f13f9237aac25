//! Parallel plan execution with per-stem outcome tracking.

#[allow(clippy::module_inception)]
mod executor;
mod ledger;

pub use executor::{ExecutionReport, TransferExecutor, TransferFailure};
pub use ledger::{OutcomeLedger, StackOutcome};
