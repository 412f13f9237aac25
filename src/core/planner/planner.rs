//! Plan generator for stack and import operations.

use super::types::*;
use crate::core::catalog::{stacked_file_name, FileRecord};
use crate::core::detector::CandidateStack;
use crate::core::transfer::{Category, DestinationState, TransferMode, TransferOp};
use crate::error::TransferError;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Highest `__N` tried before giving up on a unit
const MAX_DISAMBIGUATOR: u32 = 9999;

/// Generates transfer plans
pub struct TransferPlanner {
    config: PlannerConfig,
}

impl TransferPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// `YYYY/YYYY-MM-DD`
    pub fn dated_dir(date: NaiveDate) -> PathBuf {
        PathBuf::from(format!("{}", date.year())).join(format!(
            "{}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        ))
    }

    /// Name a stack output gets: the marker is added unless already present
    pub fn output_file_name(&self, output: &FileRecord) -> String {
        if output.is_processed() {
            output.file_name().to_string()
        } else {
            stacked_file_name(output.stem(), output.extension(), self.config.prefix.as_deref())
        }
    }

    /// Plan the accepted stacks: inputs move to the dated input directory of
    /// the output's date, outputs get the marker (and move to Lightroom when
    /// a Lightroom root is configured).
    pub fn plan_stacks(&self, stacks: &[CandidateStack<'_>], plan: &mut TransferPlan) {
        for stack in stacks.iter().filter(|s| s.is_accepted()) {
            let Some(date) = stack.output.modified_date() else {
                plan.errors.push(format!(
                    "{}: no modification date, stack skipped",
                    stack.output.file_name()
                ));
                continue;
            };
            let dated = Self::dated_dir(date);
            let input_dir = self.config.input_root.join(&dated);

            let mut units: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
            for record in stack.input_records() {
                units.entry(record.stem_key()).or_default().push(record);
            }
            for (stem, members) in units {
                let targets = members
                    .iter()
                    .map(|r| (*r, input_dir.join(r.file_name())))
                    .collect();
                self.plan_unit(stem, targets, TransferMode::Move, Category::Input, plan);
            }

            let output_dir = match &self.config.lightroom_root {
                Some(root) => root.join(&dated),
                None => parent_of(stack.output.path()),
            };
            let target = output_dir.join(self.output_file_name(stack.output));
            if target == stack.output.path() {
                tracing::debug!(file = stack.output.file_name(), "Output already renamed");
                continue;
            }
            self.plan_unit(
                stack.output.stem_key(),
                vec![(stack.output, target)],
                TransferMode::Move,
                Category::Output,
                plan,
            );
        }
    }

    /// Plan files not taken by any stack into the dated Lightroom
    /// directories of their own dates. Files that no longer exist are
    /// skipped without complaint.
    pub fn plan_remaining<'a>(
        &self,
        records: impl IntoIterator<Item = &'a FileRecord>,
        plan: &mut TransferPlan,
    ) {
        let Some(root) = &self.config.lightroom_root else {
            plan.errors
                .push("No Lightroom root configured, remaining files skipped".to_string());
            return;
        };

        let mut units: BTreeMap<(String, PathBuf), Vec<&FileRecord>> = BTreeMap::new();
        for record in records {
            if !record.path().exists() {
                continue;
            }
            let Some(date) = record.modified_date() else {
                plan.errors.push(format!(
                    "{}: no modification date, left in place",
                    record.file_name()
                ));
                continue;
            };
            units
                .entry((record.stem_key().to_string(), root.join(Self::dated_dir(date))))
                .or_default()
                .push(record);
        }

        for ((stem, dir), members) in units {
            let targets = members
                .iter()
                .map(|r| (*r, dir.join(r.file_name())))
                .collect();
            self.plan_unit(&stem, targets, TransferMode::Move, Category::Remaining, plan);
        }
    }

    /// Plan orphan JPEGs for the simple modes.
    ///
    /// `rename` adds the marker (and prefix). No disambiguation happens here:
    /// taken destinations surface as collisions unless forced.
    pub fn plan_orphans(
        &self,
        orphans: &[&FileRecord],
        dest_dir: &Path,
        mode: TransferMode,
        rename: bool,
        plan: &mut TransferPlan,
    ) {
        for orphan in orphans {
            let name = if rename {
                stacked_file_name(orphan.stem(), orphan.extension(), self.config.prefix.as_deref())
            } else {
                orphan.file_name().to_string()
            };
            let destination = dest_dir.join(name);
            if destination == orphan.path() {
                continue;
            }
            plan.push(TransferOp {
                source: orphan.path().to_path_buf(),
                destination,
                mode,
                category: Category::Output,
                stem: orphan.stem_key().to_string(),
            });
        }
    }

    /// Add one unit (files sharing a stem and a directory), renaming every
    /// member with the same `__N` if any member's destination is taken.
    fn plan_unit(
        &self,
        stem: &str,
        targets: Vec<(&FileRecord, PathBuf)>,
        mode: TransferMode,
        category: Category,
        plan: &mut TransferPlan,
    ) {
        let suffix = if self.config.disambiguate {
            match self.free_suffix(&targets, plan) {
                Ok(suffix) => suffix,
                Err(e) => {
                    tracing::warn!(stem, error = %e, "Could not place unit");
                    plan.errors.push(e.to_string());
                    return;
                }
            }
        } else {
            0
        };

        let mut renamed = Vec::new();
        for (record, target) in targets {
            let destination = if suffix == 0 {
                target.clone()
            } else {
                with_disambiguator(&target, suffix)
            };
            if destination != target {
                renamed.push((target, destination.clone()));
            }
            plan.push(TransferOp {
                source: record.path().to_path_buf(),
                destination,
                mode,
                category,
                stem: record.stem_key().to_string(),
            });
        }

        if !renamed.is_empty() {
            tracing::warn!(
                stem,
                suffix,
                files = renamed.len(),
                "Destination taken by a different file, renaming unit"
            );
            plan.collisions.push(CollisionResolution {
                stem: stem.to_string(),
                suffix,
                renamed,
            });
        }
    }

    /// Smallest `n` for which every member's destination is free
    fn free_suffix(
        &self,
        targets: &[(&FileRecord, PathBuf)],
        plan: &TransferPlan,
    ) -> Result<u32, TransferError> {
        'candidates: for n in 0..=MAX_DISAMBIGUATOR {
            for (record, target) in targets {
                let candidate = if n == 0 {
                    target.clone()
                } else {
                    with_disambiguator(target, n)
                };
                if plan.is_claimed(&candidate) {
                    continue 'candidates;
                }
                // An unreadable destination will not get better with a suffix
                let state = DestinationState::probe(record.path(), &candidate)
                    .map_err(|e| TransferError::io(&candidate, e))?;
                if !state.is_free() {
                    continue 'candidates;
                }
            }
            return Ok(n);
        }

        Err(TransferError::NoFreeName {
            path: targets
                .first()
                .map(|(_, t)| t.clone())
                .unwrap_or_default(),
        })
    }
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// `dir/IMG_0100.ORF` with `n = 1` becomes `dir/IMG_0100__1.ORF`
pub fn with_disambiguator(path: &Path, n: u32) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}__{}.{}", stem, n, ext),
        None => format!("{}__{}", stem, n),
    };
    path.with_file_name(name)
}
