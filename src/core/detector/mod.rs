//! Stack detection.
//!
//! Finds JPEGs the camera composed from several frames, using only frame
//! numbers and modification times:
//!
//! 1. An orphan JPEG (no same-stem raw) is a candidate output.
//! 2. Frames are collected backward from it while numbers stay adjacent,
//!    the first frame is within the output lag and later frames are within
//!    the input gap, up to the input limit.
//! 3. A candidate sitting at the end of an over-long tight run is a burst
//!    (focus bracketing) and is rejected whole.
//! 4. Between 3 and 15 frames is a stack.

#[allow(clippy::module_inception)]
mod detector;
mod orphans;
mod types;

pub use detector::{NumericSequence, StackDetector};
pub use orphans::find_orphans;
pub use types::*;
