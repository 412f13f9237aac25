//! Parallel execution of a transfer plan.

use super::ledger::{OutcomeLedger, StackOutcome};
use crate::core::planner::TransferPlan;
use crate::core::transfer::{Category, TransferAction, TransferEngine};
use crate::error::ConfigError;
use crate::events::{Event, EventSender, TransferEvent, TransferProgress};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// One operation that did not complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: Category,
    pub message: String,
    /// The destination held different content
    pub collision: bool,
}

/// Result of running one plan
#[derive(Debug)]
pub struct ExecutionReport {
    pub transferred: usize,
    pub deduplicated: usize,
    pub healed: usize,
    pub overwritten: usize,
    pub failures: Vec<TransferFailure>,
    /// Stems where only some of the files arrived
    pub partial: Vec<(String, StackOutcome)>,
    pub duration_ms: u64,
    outcomes: OutcomeLedger,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.transferred + self.deduplicated + self.healed + self.overwritten
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn collisions(&self) -> impl Iterator<Item = &TransferFailure> {
        self.failures.iter().filter(|f| f.collision)
    }

    /// Stems whose every planned operation succeeded
    pub fn processed_stems(&self) -> HashSet<String> {
        self.outcomes.processed_stems()
    }

    pub fn outcomes(&self) -> &OutcomeLedger {
        &self.outcomes
    }
}

/// Runs plan operations on a dedicated rayon pool.
///
/// A failed operation never stops the batch; it is recorded and the
/// remaining operations still run.
pub struct TransferExecutor {
    pool: rayon::ThreadPool,
    jobs: usize,
}

impl TransferExecutor {
    pub fn new(jobs: usize) -> Result<Self, ConfigError> {
        if jobs == 0 {
            return Err(ConfigError::ZeroJobs);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("stackcopy-worker-{}", i))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;
        Ok(Self { pool, jobs })
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn execute(
        &self,
        plan: &TransferPlan,
        engine: &TransferEngine,
        events: &EventSender,
    ) -> ExecutionReport {
        let start = Instant::now();
        let total = plan.len();
        let outcomes = OutcomeLedger::new();

        // Every expectation is in place before the first worker reports back
        for (stem, count) in plan.expected_per_stem() {
            outcomes.expect(&stem, count);
        }

        events.send(Event::Transfer(TransferEvent::Started { total }));

        let completed = AtomicUsize::new(0);
        let transferred = AtomicUsize::new(0);
        let deduplicated = AtomicUsize::new(0);
        let healed = AtomicUsize::new(0);
        let overwritten = AtomicUsize::new(0);

        let failures: Vec<TransferFailure> = self.pool.install(|| {
            plan.ops
                .par_iter()
                .filter_map(|op| {
                    let result = engine.execute(op);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;

                    let failure = match result {
                        Ok(outcome) => {
                            let counter = match outcome.action {
                                TransferAction::Transferred => &transferred,
                                TransferAction::Deduplicated => &deduplicated,
                                TransferAction::Healed => &healed,
                                TransferAction::Overwritten => &overwritten,
                            };
                            counter.fetch_add(1, Ordering::SeqCst);

                            if outcomes.record_success(&op.stem) {
                                debug!(stem = %op.stem, "All files for stem completed");
                            }
                            events.send(Event::Transfer(TransferEvent::FileDone {
                                op: op.clone(),
                                outcome,
                            }));
                            None
                        }
                        Err(e) => {
                            outcomes.record_failure(&op.stem);
                            warn!(
                                source = %op.source.display(),
                                destination = %op.destination.display(),
                                error = %e,
                                "Transfer failed"
                            );
                            events.send(Event::Transfer(TransferEvent::FileFailed {
                                op: op.clone(),
                                message: e.to_string(),
                            }));
                            Some(TransferFailure {
                                source: op.source.clone(),
                                destination: op.destination.clone(),
                                category: op.category,
                                message: e.to_string(),
                                collision: e.is_collision(),
                            })
                        }
                    };

                    events.send(Event::Transfer(TransferEvent::Progress(TransferProgress {
                        completed: done,
                        total,
                        current_path: op.source.clone(),
                    })));

                    failure
                })
                .collect()
        });

        let partial = outcomes.partial_stems();
        for (stem, outcome) in &partial {
            warn!(
                stem = %stem,
                succeeded = outcome.succeeded,
                expected = outcome.expected,
                "Only part of the files for this stem were transferred"
            );
            events.send(Event::Transfer(TransferEvent::PartialStack {
                stem: stem.clone(),
                outcome: *outcome,
            }));
        }

        let report = ExecutionReport {
            transferred: transferred.into_inner(),
            deduplicated: deduplicated.into_inner(),
            healed: healed.into_inner(),
            overwritten: overwritten.into_inner(),
            failures,
            partial,
            duration_ms: start.elapsed().as_millis() as u64,
            outcomes,
        };

        events.send(Event::Transfer(TransferEvent::Completed {
            succeeded: report.succeeded(),
            failed: report.failed(),
        }));

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transfer::{TransferMode, TransferOp};
    use crate::events::{null_sender, EventChannel};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn op(source: &Path, destination: PathBuf, stem: &str) -> TransferOp {
        TransferOp {
            source: source.to_path_buf(),
            destination,
            mode: TransferMode::Move,
            category: Category::Input,
            stem: stem.to_string(),
        }
    }

    fn plan_of(ops: Vec<TransferOp>) -> TransferPlan {
        let mut plan = TransferPlan::new();
        plan.ops = ops;
        plan
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(matches!(TransferExecutor::new(0), Err(ConfigError::ZeroJobs)));
    }

    #[test]
    fn moves_every_file_and_marks_stems_processed() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        let mut ops = Vec::new();
        for i in 0..20 {
            let stem = format!("img_{:04}", i);
            for ext in ["ORF", "JPG"] {
                let name = format!("IMG_{:04}.{}", i, ext);
                let source = temp.path().join(&name);
                fs::write(&source, format!("{} data", name)).unwrap();
                ops.push(op(&source, dest.join(&name), &stem));
            }
        }

        let executor = TransferExecutor::new(4).unwrap();
        let report = executor.execute(
            &plan_of(ops),
            &TransferEngine::new(false, false),
            &null_sender(),
        );

        assert_eq!(report.transferred, 40);
        assert_eq!(report.failed(), 0);
        assert!(report.partial.is_empty());
        assert_eq!(report.processed_stems().len(), 20);
        assert!(dest.join("IMG_0007.ORF").exists());
        assert!(!temp.path().join("IMG_0007.ORF").exists());
    }

    #[test]
    fn failure_does_not_stop_the_batch_and_leaves_partial_stem() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        fs::create_dir_all(&dest).unwrap();

        let raw = temp.path().join("IMG_0100.ORF");
        let jpg = temp.path().join("IMG_0100.JPG");
        let other = temp.path().join("IMG_0101.ORF");
        fs::write(&raw, b"raw").unwrap();
        fs::write(&jpg, b"jpg").unwrap();
        fs::write(&other, b"other").unwrap();
        // Occupied by different content, so the JPEG collides
        fs::write(dest.join("IMG_0100.JPG"), b"someone else").unwrap();

        let plan = plan_of(vec![
            op(&raw, dest.join("IMG_0100.ORF"), "img_0100"),
            op(&jpg, dest.join("IMG_0100.JPG"), "img_0100"),
            op(&other, dest.join("IMG_0101.ORF"), "img_0101"),
        ]);

        let executor = TransferExecutor::new(2).unwrap();
        let report = executor.execute(&plan, &TransferEngine::new(false, false), &null_sender());

        assert_eq!(report.transferred, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.collisions().count(), 1);
        assert!(jpg.exists());
        assert_eq!(report.partial.len(), 1);
        assert_eq!(report.partial[0].0, "img_0100");

        let processed = report.processed_stems();
        assert!(processed.contains("img_0101"));
        assert!(!processed.contains("img_0100"));
    }

    #[test]
    fn emits_progress_for_every_operation() {
        let temp = TempDir::new().unwrap();
        let mut ops = Vec::new();
        for i in 0..5 {
            let source = temp.path().join(format!("IMG_{:04}.ORF", i));
            fs::write(&source, b"x").unwrap();
            ops.push(op(&source, temp.path().join("out").join(format!("IMG_{:04}.ORF", i)), "s"));
        }

        let (sender, receiver) = EventChannel::new();
        let executor = TransferExecutor::new(2).unwrap();
        executor.execute(&plan_of(ops), &TransferEngine::new(true, false), &sender);
        drop(sender);

        let progress = receiver
            .iter()
            .filter(|e| matches!(e, Event::Transfer(TransferEvent::Progress(_))))
            .count();
        assert_eq!(progress, 5);
    }
}
