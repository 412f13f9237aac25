//! # Pipeline Module
//!
//! Runs one mode end to end.
//!
//! ## Stages
//! 1. **Scan** - catalogue raw and JPEG files of the source directory
//! 2. **Detect** - find stacks (Lightroom modes) or orphan JPEGs (simple modes)
//! 3. **Plan** - turn decisions into transfer operations
//! 4. **Transfer** - execute the operations on the worker pool
//!
//! Lightroom import repeats planning and transfer for every file no stack
//! took, once the stack phase has settled.

mod config;
mod report;
mod runner;

pub use config::{default_jobs, RunConfig, RunMode, DEFAULT_INPUT_DIR, STACKCOPY_DIR};
pub use report::{RunReport, StackSummary};
pub use runner::{Pipeline, PipelineBuilder};
