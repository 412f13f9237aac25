//! # Core Module
//!
//! The UI-agnostic stack detection and transfer engine.
//!
//! ## Modules
//! - `catalog` - Lists raw and JPEG files and indexes them by stem
//! - `detector` - Finds camera stacks and orphan JPEGs
//! - `planner` - Decides where each file goes
//! - `transfer` - Moves or copies one file safely
//! - `executor` - Runs a plan on a worker pool
//! - `pipeline` - Orchestrates a whole run

pub mod catalog;
pub mod detector;
pub mod executor;
pub mod pipeline;
pub mod planner;
pub mod transfer;

// Re-export commonly used types
pub use catalog::{Catalog, FileRecord};
pub use detector::{CandidateStack, DetectorConfig, RejectionReason, StackDetector};
pub use pipeline::{Pipeline, RunConfig, RunMode, RunReport};
pub use transfer::{TransferEngine, TransferOp};
