//! Per-stem bookkeeping shared by the worker threads.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

const SHARDS: usize = 16;

/// Expected vs. achieved operations for one stem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutcome {
    pub expected: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl StackOutcome {
    /// Every expected operation succeeded
    pub fn is_processed(&self) -> bool {
        self.expected > 0 && self.succeeded == self.expected
    }

    /// Some but not all operations succeeded, and none are still pending
    pub fn is_partial(&self) -> bool {
        self.succeeded > 0 && self.succeeded < self.expected && self.is_settled()
    }

    fn is_settled(&self) -> bool {
        self.succeeded + self.failed >= self.expected
    }
}

/// Stem-keyed outcomes, partitioned across several locks.
///
/// A completion and the check of whether it finished its stem happen under
/// the same lock, so sibling completions on other threads cannot interleave.
#[derive(Debug)]
pub struct OutcomeLedger {
    shards: Vec<Mutex<HashMap<String, StackOutcome>>>,
}

impl OutcomeLedger {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, stem: &str) -> MutexGuard<'_, HashMap<String, StackOutcome>> {
        let mut hasher = DefaultHasher::new();
        stem.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        // A poisoned shard still holds valid counters
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `count` more expected operations for `stem`
    pub fn expect(&self, stem: &str, count: usize) {
        self.shard(stem).entry(stem.to_string()).or_default().expected += count;
    }

    /// Record a success. Returns true when this completion made the stem
    /// fully processed.
    pub fn record_success(&self, stem: &str) -> bool {
        let mut shard = self.shard(stem);
        let outcome = shard.entry(stem.to_string()).or_default();
        outcome.succeeded += 1;
        outcome.is_processed()
    }

    pub fn record_failure(&self, stem: &str) {
        self.shard(stem).entry(stem.to_string()).or_default().failed += 1;
    }

    pub fn get(&self, stem: &str) -> Option<StackOutcome> {
        self.shard(stem).get(stem).copied()
    }

    pub fn is_processed(&self, stem: &str) -> bool {
        self.get(stem).map(|o| o.is_processed()).unwrap_or(false)
    }

    /// All fully processed stems
    pub fn processed_stems(&self) -> HashSet<String> {
        self.collect(|o| o.is_processed())
            .into_iter()
            .map(|(stem, _)| stem)
            .collect()
    }

    /// Stems where only part of the files arrived, sorted by stem
    pub fn partial_stems(&self) -> Vec<(String, StackOutcome)> {
        let mut partial = self.collect(|o| o.is_partial());
        partial.sort_by(|a, b| a.0.cmp(&b.0));
        partial
    }

    fn collect(&self, keep: impl Fn(&StackOutcome) -> bool) -> Vec<(String, StackOutcome)> {
        self.shards
            .iter()
            .flat_map(|shard| {
                let shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
                let kept: Vec<_> = shard
                    .iter()
                    .filter(|(_, o)| keep(o))
                    .map(|(stem, o)| (stem.clone(), *o))
                    .collect();
                kept
            })
            .collect()
    }
}

impl Default for OutcomeLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn stem_is_processed_only_when_all_succeed() {
        let ledger = OutcomeLedger::new();
        ledger.expect("img_0100", 2);

        assert!(!ledger.record_success("img_0100"));
        assert!(!ledger.is_processed("img_0100"));
        assert!(ledger.record_success("img_0100"));
        assert!(ledger.is_processed("img_0100"));
    }

    #[test]
    fn failure_leaves_stem_partial() {
        let ledger = OutcomeLedger::new();
        ledger.expect("img_0100", 2);

        ledger.record_success("img_0100");
        ledger.record_failure("img_0100");

        assert!(!ledger.is_processed("img_0100"));
        let partial = ledger.partial_stems();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial[0].0, "img_0100");
        assert_eq!(partial[0].1.succeeded, 1);
    }

    #[test]
    fn total_failure_is_not_partial() {
        let ledger = OutcomeLedger::new();
        ledger.expect("img_0100", 2);
        ledger.record_failure("img_0100");
        ledger.record_failure("img_0100");
        assert!(ledger.partial_stems().is_empty());
        assert!(ledger.processed_stems().is_empty());
    }

    #[test]
    fn unknown_stem_is_not_processed() {
        let ledger = OutcomeLedger::new();
        assert!(!ledger.is_processed("img_9999"));
        assert_eq!(ledger.get("img_9999"), None);
    }

    #[test]
    fn concurrent_completions_finish_each_stem_once() {
        let ledger = Arc::new(OutcomeLedger::new());
        for i in 0..50 {
            ledger.expect(&format!("img_{:04}", i), 4);
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    (0..50)
                        .filter(|i| ledger.record_success(&format!("img_{:04}", i)))
                        .count()
                })
            })
            .collect();

        let finished: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(finished, 50);
        assert_eq!(ledger.processed_stems().len(), 50);
    }
}
