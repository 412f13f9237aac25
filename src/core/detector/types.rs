//! Types for the stack detector.

use crate::core::catalog::FileRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Longest accepted delay between the last input frame and the output JPEG
pub const MAX_OUTPUT_LAG_SECONDS: f64 = 120.0;

/// Longest accepted delay between two consecutive input frames
pub const MAX_INPUT_GAP_SECONDS: f64 = 6.0;

/// Frame spacing at or below which a long run counts as a burst
pub const BURST_SAFETY_SECONDS: f64 = 2.0;

/// Fewest input frames a stack may have
pub const MIN_STACK_INPUTS: usize = 3;

/// Most input frames a stack may have
pub const MAX_STACK_INPUTS: usize = 15;

/// Thresholds used by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub min_inputs: usize,
    pub max_inputs: usize,
    pub max_output_lag_secs: f64,
    pub max_input_gap_secs: f64,
    /// Spacing for the burst check. Applied independently of
    /// `max_input_gap_secs`, after the backward walk.
    pub burst_interval_secs: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_inputs: MIN_STACK_INPUTS,
            max_inputs: MAX_STACK_INPUTS,
            max_output_lag_secs: MAX_OUTPUT_LAG_SECONDS,
            max_input_gap_secs: MAX_INPUT_GAP_SECONDS,
            burst_interval_secs: BURST_SAFETY_SECONDS,
        }
    }
}

/// All records sharing one frame number
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub number: u64,
    pub records: Vec<&'a FileRecord>,
}

impl<'a> Frame<'a> {
    pub fn has_raw(&self) -> bool {
        self.records.iter().any(|r| r.is_raw())
    }

    /// Shutter time of the frame: the raw file's mtime, else the earliest
    pub fn time(&self) -> Option<SystemTime> {
        match self.records.iter().find(|r| r.is_raw()) {
            Some(raw) => raw.modified(),
            None => self.records.iter().filter_map(|r| r.modified()).min(),
        }
    }
}

/// Why the backward walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum WalkStop {
    /// Ran out of earlier frames
    SequenceStart,
    /// Collected the maximum number of inputs
    InputLimit,
    /// Frame numbers are not adjacent
    NumericGap { from: u64, to: u64 },
    /// Frame has no raw file, so it is not a stack input
    NotAnInput { number: u64 },
    /// Frame already belongs to another stack or burst
    AlreadyClaimed { number: u64 },
    /// Frame has no readable modification time
    MissingTimestamp { number: u64 },
    /// Output was written too long after the frame before it
    OutputLag { number: u64, seconds: f64 },
    /// Two input frames are too far apart
    InputGap { number: u64, seconds: f64 },
}

impl fmt::Display for WalkStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkStop::SequenceStart => write!(f, "start of sequence"),
            WalkStop::InputLimit => write!(f, "input limit reached"),
            WalkStop::NumericGap { from, to } => {
                write!(f, "numeric gap between frames {} and {}", to, from)
            }
            WalkStop::NotAnInput { number } => write!(f, "frame {} has no raw file", number),
            WalkStop::AlreadyClaimed { number } => {
                write!(f, "frame {} already belongs to another stack", number)
            }
            WalkStop::MissingTimestamp { number } => {
                write!(f, "frame {} has no modification time", number)
            }
            WalkStop::OutputLag { number, seconds } => {
                write!(f, "output lag {:.1}s after frame {}", seconds, number)
            }
            WalkStop::InputGap { number, seconds } => {
                write!(f, "input gap {:.1}s at frame {}", seconds, number)
            }
        }
    }
}

/// The rule that rejected a candidate, with the measured values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum RejectionReason {
    /// The output JPEG itself has no modification time
    MissingOutputTimestamp,
    /// The nearest frame is further from the output than the lag limit
    OutputLagExceeded { lag_secs: f64, limit_secs: f64 },
    TooFewInputs {
        count: usize,
        min: usize,
        stopped_by: WalkStop,
    },
    TooManyInputs { count: usize, max: usize },
    /// The frames belong to an unbroken tight run longer than a stack can be
    BurstDetected {
        run_length: usize,
        max_inputs: usize,
        interval_secs: f64,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MissingOutputTimestamp => {
                write!(f, "output has no modification time")
            }
            RejectionReason::OutputLagExceeded {
                lag_secs,
                limit_secs,
            } => write!(
                f,
                "output written {:.1}s after last frame (limit {:.0}s)",
                lag_secs, limit_secs
            ),
            RejectionReason::TooFewInputs {
                count,
                min,
                stopped_by,
            } => write!(
                f,
                "only {} input frame(s), need {} (stopped at {})",
                count, min, stopped_by
            ),
            RejectionReason::TooManyInputs { count, max } => {
                write!(f, "{} input frames, at most {} allowed", count, max)
            }
            RejectionReason::BurstDetected {
                run_length,
                max_inputs,
                interval_secs,
            } => write!(
                f,
                "burst of {} frames at <= {:.1}s spacing (more than {})",
                run_length, interval_secs, max_inputs
            ),
        }
    }
}

/// Detector decision for one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectionReason),
}

/// An orphan JPEG and the frames that may have produced it
#[derive(Debug, Clone)]
pub struct CandidateStack<'a> {
    pub output: &'a FileRecord,
    /// Input frames, oldest first. For a burst rejection this is the whole
    /// burst run.
    pub inputs: Vec<Frame<'a>>,
    pub verdict: Verdict,
}

impl<'a> CandidateStack<'a> {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn is_burst(&self) -> bool {
        matches!(
            self.verdict,
            Verdict::Rejected(RejectionReason::BurstDetected { .. })
        )
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match &self.verdict {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }

    /// Number of input frames
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Every file of every input frame
    pub fn input_records(&self) -> impl Iterator<Item = &'a FileRecord> + '_ {
        self.inputs.iter().flat_map(|f| f.records.iter().copied())
    }

    /// First and last input frame numbers
    pub fn frame_range(&self) -> Option<(u64, u64)> {
        Some((self.inputs.first()?.number, self.inputs.last()?.number))
    }
}

/// Everything the detector decided for one catalog
#[derive(Debug, Default)]
pub struct DetectionResult<'a> {
    pub stacks: Vec<CandidateStack<'a>>,
}

impl<'a> DetectionResult<'a> {
    pub fn accepted(&self) -> impl Iterator<Item = &CandidateStack<'a>> {
        self.stacks.iter().filter(|s| s.is_accepted())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &CandidateStack<'a>> {
        self.stacks.iter().filter(|s| !s.is_accepted())
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted().count()
    }

    pub fn rejected_count(&self) -> usize {
        self.stacks.len() - self.accepted_count()
    }

    /// Files of burst-rejected candidates, which must stay where they are
    pub fn held_back(&self) -> impl Iterator<Item = &'a FileRecord> + '_ {
        self.stacks
            .iter()
            .filter(|s| s.is_burst())
            .flat_map(|s| s.input_records().chain(std::iter::once(s.output)))
    }
}
