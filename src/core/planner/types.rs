//! Types for the transfer planner.

use crate::core::transfer::TransferOp;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use uuid::Uuid;

/// Where planned files go
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Text placed before the `stacked` marker in output names
    pub prefix: Option<String>,
    /// Root of the dated directories for stack input frames
    pub input_root: PathBuf,
    /// Root of the dated Lightroom directories. When set, stack outputs are
    /// moved there instead of being renamed in place.
    pub lightroom_root: Option<PathBuf>,
    /// Rename whole units with `__N` when a destination is taken
    pub disambiguate: bool,
}

/// A unit of files that had to be renamed to avoid a taken destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollisionResolution {
    /// Lowercase stem shared by the unit
    pub stem: String,
    /// The `N` in `__N`
    pub suffix: u32,
    /// (planned destination, destination actually used)
    pub renamed: Vec<(PathBuf, PathBuf)>,
}

/// A batch of operations ready for the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPlan {
    pub id: String,
    pub ops: Vec<TransferOp>,
    pub collisions: Vec<CollisionResolution>,
    /// Files that could not be planned (non-fatal)
    pub errors: Vec<String>,
    #[serde(skip)]
    pub(super) claimed: HashSet<PathBuf>,
}

impl TransferPlan {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ops: Vec::new(),
            collisions: Vec::new(),
            errors: Vec::new(),
            claimed: HashSet::new(),
        }
    }

    /// A fresh plan that still treats `previous` destinations as taken
    pub fn continuing(previous: &TransferPlan) -> Self {
        let mut plan = Self::new();
        plan.claimed = previous.claimed.clone();
        plan
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations per stem
    pub fn expected_per_stem(&self) -> HashMap<String, usize> {
        let mut expected = HashMap::new();
        for op in &self.ops {
            *expected.entry(op.stem.clone()).or_insert(0) += 1;
        }
        expected
    }

    pub(super) fn push(&mut self, op: TransferOp) {
        self.claimed.insert(op.destination.clone());
        self.ops.push(op);
    }

    pub(super) fn is_claimed(&self, path: &std::path::Path) -> bool {
        self.claimed.contains(path)
    }
}

impl Default for TransferPlan {
    fn default() -> Self {
        Self::new()
    }
}
