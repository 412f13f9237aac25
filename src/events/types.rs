//! Event type definitions for progress reporting.

use crate::core::detector::RejectionReason;
use crate::core::executor::StackOutcome;
use crate::core::planner::CollisionResolution;
use crate::core::transfer::{TransferOp, TransferOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// All events emitted during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Catalog scan events
    Scan(ScanEvent),
    /// Stack detection decisions
    Detect(DetectEvent),
    /// File transfer events
    Transfer(TransferEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the catalog scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    Started { path: PathBuf },
    Completed {
        raw_files: usize,
        jpeg_files: usize,
        skipped_processed: usize,
    },
}

/// One event per candidate stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DetectEvent {
    StackAccepted {
        output: PathBuf,
        inputs: usize,
        first_frame: u64,
        last_frame: u64,
    },
    StackRejected {
        output: PathBuf,
        inputs: usize,
        reason: RejectionReason,
    },
    Completed { accepted: usize, rejected: usize },
}

/// Events during transfer execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransferEvent {
    /// A batch is about to run
    Started { total: usize },
    /// A unit was renamed to avoid a taken destination
    CollisionResolved(CollisionResolution),
    /// A single operation finished
    FileDone {
        op: TransferOp,
        outcome: TransferOutcome,
    },
    /// A single operation failed; the batch continues
    FileFailed { op: TransferOp, message: String },
    Progress(TransferProgress),
    /// Only part of a stem's files arrived
    PartialStack { stem: String, outcome: StackOutcome },
    Completed { succeeded: usize, failed: usize },
}

/// Progress information during a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProgress {
    pub completed: usize,
    pub total: usize,
    pub current_path: PathBuf,
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    Started,
    PhaseChanged { phase: PipelinePhase },
    Completed { summary: RunSummary },
}

/// Phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Detecting,
    Planning,
    Transferring,
    /// Lightroom import: files not taken by any stack
    Remaining,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Detecting => write!(f, "Detecting stacks"),
            PipelinePhase::Planning => write!(f, "Planning"),
            PipelinePhase::Transferring => write!(f, "Transferring"),
            PipelinePhase::Remaining => write!(f, "Importing remaining files"),
        }
    }
}

/// Counts for the whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub stacks_accepted: usize,
    pub stacks_rejected: usize,
    pub transferred: usize,
    pub deduplicated: usize,
    pub healed: usize,
    pub overwritten: usize,
    pub failed: usize,
    pub partial_stacks: usize,
    pub collisions_resolved: usize,
    pub skipped_processed: usize,
    pub dry_run: bool,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Operations that wrote or renamed something (or would have)
    pub fn files_written(&self) -> usize {
        self.transferred + self.healed + self.overwritten
    }

    /// Operations that ended well, including no-op duplicates
    pub fn succeeded(&self) -> usize {
        self.files_written() + self.deduplicated
    }
}
