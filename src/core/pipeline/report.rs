//! What a run did, returned to the caller.

use super::config::RunMode;
use crate::core::detector::{CandidateStack, RejectionReason};
use crate::core::executor::{ExecutionReport, StackOutcome, TransferFailure};
use crate::core::planner::{CollisionResolution, TransferPlan};
use crate::core::transfer::TransferOp;
use crate::events::RunSummary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One detector decision, detached from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSummary {
    pub output: PathBuf,
    pub inputs: Vec<PathBuf>,
    /// First and last frame number of the inputs
    pub frames: Option<(u64, u64)>,
    pub accepted: bool,
    pub reason: Option<RejectionReason>,
}

impl From<&CandidateStack<'_>> for StackSummary {
    fn from(stack: &CandidateStack<'_>) -> Self {
        Self {
            output: stack.output.path().to_path_buf(),
            inputs: stack.input_records().map(|r| r.path().to_path_buf()).collect(),
            frames: stack.frame_range(),
            accepted: stack.is_accepted(),
            reason: stack.rejection().cloned(),
        }
    }
}

/// Aggregated result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub source: PathBuf,
    pub stacks: Vec<StackSummary>,
    /// Every planned operation, in plan order
    pub ops: Vec<TransferOp>,
    pub collisions: Vec<CollisionResolution>,
    /// Files the planner could not place
    pub plan_errors: Vec<String>,
    pub failures: Vec<TransferFailure>,
    pub partial_stacks: Vec<(String, StackOutcome)>,
    pub summary: RunSummary,
}

impl RunReport {
    pub(super) fn new(mode: RunMode, source: PathBuf, dry_run: bool) -> Self {
        Self {
            mode,
            source,
            stacks: Vec::new(),
            ops: Vec::new(),
            collisions: Vec::new(),
            plan_errors: Vec::new(),
            failures: Vec::new(),
            partial_stacks: Vec::new(),
            summary: RunSummary {
                dry_run,
                ..RunSummary::default()
            },
        }
    }

    /// Fold one executed plan into the totals
    pub(super) fn absorb(&mut self, plan: &TransferPlan, execution: &ExecutionReport) {
        self.ops.extend(plan.ops.iter().cloned());
        self.collisions.extend(plan.collisions.iter().cloned());
        self.plan_errors.extend(plan.errors.iter().cloned());
        self.failures.extend(execution.failures.iter().cloned());
        self.partial_stacks.extend(execution.partial.iter().cloned());

        let summary = &mut self.summary;
        summary.transferred += execution.transferred;
        summary.deduplicated += execution.deduplicated;
        summary.healed += execution.healed;
        summary.overwritten += execution.overwritten;
        summary.failed += execution.failed();
        summary.partial_stacks += execution.partial.len();
        summary.collisions_resolved += plan.collisions.len();
    }

    pub fn accepted_stacks(&self) -> impl Iterator<Item = &StackSummary> {
        self.stacks.iter().filter(|s| s.accepted)
    }

    pub fn rejected_stacks(&self) -> impl Iterator<Item = &StackSummary> {
        self.stacks.iter().filter(|s| !s.accepted)
    }

    /// Whether any operation failed
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
