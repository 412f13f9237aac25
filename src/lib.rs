//! # stackcopy
//!
//! Finds the composites an in-camera focus stack produces and moves the
//! frames that fed them out of the way, without ever losing a file.
//!
//! ## Core Philosophy
//! - **Names and times only** - decisions use file names and modification
//!   times, never pixel data
//! - **Never lose a file** - copies are staged and renamed into place, moves
//!   fall back to verified copies, and reruns heal what a crash left behind
//! - **Explain decisions** - every rejected stack says which rule fired
//!
//! ## Architecture
//! - `core` - Catalog, detector, planner, transfer engine and executor
//! - `events` - Event-driven progress reporting
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::pipeline::{Pipeline, RunConfig, RunMode, RunReport};
pub use error::{Result, StackCopyError};

/// Install a stderr tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"warn"`) is
/// used. Calling this twice is harmless.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
