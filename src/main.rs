//! # stackcopy CLI
//!
//! ## Usage
//! ```bash
//! stackcopy lightroom ~/card --today
//! stackcopy lightroom-import ~/card --lightroom-root ~/Pictures/Lightroom
//! stackcopy copy ~/card ~/stacked --prefix focus --dry-run
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
