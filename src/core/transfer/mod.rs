//! Atomic, resumable file transfer.
//!
//! A destination is only ever absent, fully old or fully new. Reruns after a
//! crash are safe: zero-byte leftovers are replaced and files that already
//! arrived are recognised by content.

mod engine;
mod probe;
mod types;

pub use engine::TransferEngine;
pub use probe::{files_identical, DestinationState};
pub use types::*;
