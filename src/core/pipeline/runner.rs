//! Mode-specific orchestration of scan, detection, planning and transfer.

use super::config::{RunConfig, RunMode};
use super::report::{RunReport, StackSummary};
use crate::core::catalog::{Catalog, CatalogOptions, FileRecord};
use crate::core::detector::{find_orphans, DetectionResult, DetectorConfig, StackDetector};
use crate::core::executor::{ExecutionReport, TransferExecutor};
use crate::core::planner::{PlannerConfig, TransferPlan, TransferPlanner};
use crate::core::transfer::{TransferEngine, TransferMode};
use crate::error::{ConfigError, Result};
use crate::events::{
    null_sender, DetectEvent, Event, EventSender, PipelineEvent, PipelinePhase, ScanEvent,
    TransferEvent,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Builder for a validated [`Pipeline`]
pub struct PipelineBuilder {
    config: RunConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: RunConfig::new(".", RunMode::Lightroom),
        }
    }

    /// Start from a complete configuration
    pub fn from_config(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.config.source = source.into();
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn date_filter(mut self, date: Option<NaiveDate>) -> Self {
        self.config.date_filter = date;
        self
    }

    pub fn prefix(mut self, prefix: Option<String>) -> Self {
        self.config.prefix = prefix;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.config.force = force;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.include_hidden = include;
        self
    }

    pub fn input_root(mut self, root: Option<PathBuf>) -> Self {
        self.config.input_root = root;
        self
    }

    pub fn lightroom_root(mut self, root: Option<PathBuf>) -> Self {
        self.config.lightroom_root = root;
        self
    }

    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    /// Validate the configuration and start the worker pool
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let executor = TransferExecutor::new(self.config.jobs)?;
        Ok(Pipeline {
            config: self.config,
            executor,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured run
pub struct Pipeline {
    config: RunConfig,
    executor: TransferExecutor,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run without event reporting
    pub fn run(&self) -> Result<RunReport> {
        self.run_with_events(&null_sender())
    }

    pub fn run_with_events(&self, events: &EventSender) -> Result<RunReport> {
        let start = Instant::now();
        let config = &self.config;

        events.send(Event::Pipeline(PipelineEvent::Started));
        phase(events, PipelinePhase::Scanning);
        events.send(Event::Scan(ScanEvent::Started {
            path: config.source.clone(),
        }));

        let options = CatalogOptions {
            include_processed: config.mode.detects_stacks(),
            include_hidden: config.include_hidden,
        };
        let catalog = Catalog::scan(&config.source, &options)?;
        let raw_files = catalog.raw_files().count();
        let jpeg_files = catalog.jpeg_files().count();
        info!(
            path = %config.source.display(),
            raw_files,
            jpeg_files,
            skipped_processed = catalog.skipped_processed(),
            "Catalog built"
        );
        events.send(Event::Scan(ScanEvent::Completed {
            raw_files,
            jpeg_files,
            skipped_processed: catalog.skipped_processed(),
        }));

        let engine = TransferEngine::new(config.dry_run, config.force);
        let mut report = RunReport::new(config.mode.clone(), config.source.clone(), config.dry_run);
        report.summary.skipped_processed = catalog.skipped_processed();

        if config.mode.detects_stacks() {
            self.run_lightroom(&catalog, &engine, events, &mut report);
        } else {
            self.run_simple(&catalog, &engine, events, &mut report)?;
        }

        report.summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            mode = %config.mode,
            written = report.summary.files_written(),
            deduplicated = report.summary.deduplicated,
            failed = report.summary.failed,
            dry_run = config.dry_run,
            "Run finished"
        );
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: report.summary.clone(),
        }));

        Ok(report)
    }

    /// copy / rename / stackcopy: orphan JPEGs only, original names kept on
    /// collision
    fn run_simple(
        &self,
        catalog: &Catalog,
        engine: &TransferEngine,
        events: &EventSender,
        report: &mut RunReport,
    ) -> Result<()> {
        let config = &self.config;
        let orphans = find_orphans(catalog, config.date_filter);
        info!(orphans = orphans.len(), "Orphan JPEGs found");

        let destination = config.destination_dir();
        if !config.dry_run && destination != config.source {
            fs::create_dir_all(&destination).map_err(|e| ConfigError::CreateDirectory {
                path: destination.clone(),
                source: e,
            })?;
        }

        let (mode, rename) = match &config.mode {
            RunMode::Copy { .. } => (TransferMode::Copy, config.prefix.is_some()),
            RunMode::Rename => (TransferMode::Move, true),
            _ => (TransferMode::Copy, true),
        };

        phase(events, PipelinePhase::Planning);
        let planner = TransferPlanner::new(PlannerConfig {
            prefix: config.prefix.clone(),
            input_root: config.input_root(),
            lightroom_root: None,
            disambiguate: false,
        });
        let mut plan = TransferPlan::new();
        planner.plan_orphans(&orphans, &destination, mode, rename, &mut plan);

        phase(events, PipelinePhase::Transferring);
        let execution = self.executor.execute(&plan, engine, events);
        report.absorb(&plan, &execution);
        Ok(())
    }

    /// lightroom / lightroom-import
    fn run_lightroom(
        &self,
        catalog: &Catalog,
        engine: &TransferEngine,
        events: &EventSender,
        report: &mut RunReport,
    ) {
        let config = &self.config;
        let import = config.mode == RunMode::LightroomImport;

        phase(events, PipelinePhase::Detecting);
        let detection = StackDetector::new(config.detector).detect(catalog, config.date_filter);
        announce_detection(&detection, events);
        report.stacks = detection.stacks.iter().map(StackSummary::from).collect();
        report.summary.stacks_accepted = detection.accepted_count();
        report.summary.stacks_rejected = detection.rejected_count();

        phase(events, PipelinePhase::Planning);
        let planner = TransferPlanner::new(PlannerConfig {
            prefix: config.prefix.clone(),
            input_root: config.input_root(),
            lightroom_root: if import {
                config.lightroom_root.clone()
            } else {
                None
            },
            disambiguate: !config.force,
        });
        let mut plan = TransferPlan::new();
        planner.plan_stacks(&detection.stacks, &mut plan);
        announce_collisions(&plan, events);

        phase(events, PipelinePhase::Transferring);
        let execution = self.executor.execute(&plan, engine, events);
        report.absorb(&plan, &execution);

        if !import {
            return;
        }

        phase(events, PipelinePhase::Remaining);
        let remaining = remaining_files(catalog, &detection, &execution, config.date_filter);
        info!(files = remaining.len(), "Remaining files for import");

        let mut rest = TransferPlan::continuing(&plan);
        planner.plan_remaining(remaining, &mut rest);
        announce_collisions(&rest, events);

        let execution = self.executor.execute(&rest, engine, events);
        report.absorb(&rest, &execution);
    }
}

/// Files left for the import phase.
///
/// Accepted outputs were already planned and burst frames stay put. A stack
/// file is only taken out once every operation of its stem succeeded, so a
/// half-moved pair still gets its leftover imported. Orphan JPEGs of rejected
/// candidates are ordinary files here.
fn remaining_files<'a>(
    catalog: &'a Catalog,
    detection: &DetectionResult<'a>,
    execution: &ExecutionReport,
    date_filter: Option<NaiveDate>,
) -> Vec<&'a FileRecord> {
    let processed = execution.processed_stems();
    let mut excluded: HashSet<&Path> = detection.accepted().map(|s| s.output.path()).collect();
    excluded.extend(detection.held_back().map(|r| r.path()));

    catalog
        .records()
        .iter()
        .filter(|r| !excluded.contains(r.path()))
        .filter(|r| !processed.contains(r.stem_key()))
        .filter(|r| date_filter.map_or(true, |date| r.modified_date() == Some(date)))
        .collect()
}

fn phase(events: &EventSender, phase: PipelinePhase) {
    debug!(%phase, "Phase started");
    events.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
}

fn announce_detection(detection: &DetectionResult<'_>, events: &EventSender) {
    for stack in &detection.stacks {
        let output = stack.output.path().to_path_buf();
        match stack.rejection() {
            None => {
                let (first_frame, last_frame) = stack.frame_range().unwrap_or_default();
                info!(
                    output = stack.output.file_name(),
                    inputs = stack.input_count(),
                    first_frame,
                    last_frame,
                    "Stack accepted"
                );
                events.send(Event::Detect(DetectEvent::StackAccepted {
                    output,
                    inputs: stack.input_count(),
                    first_frame,
                    last_frame,
                }));
            }
            Some(reason) => {
                debug!(
                    output = stack.output.file_name(),
                    inputs = stack.input_count(),
                    %reason,
                    "Stack rejected"
                );
                events.send(Event::Detect(DetectEvent::StackRejected {
                    output,
                    inputs: stack.input_count(),
                    reason: reason.clone(),
                }));
            }
        }
    }
    info!(
        accepted = detection.accepted_count(),
        rejected = detection.rejected_count(),
        "Detection finished"
    );
    events.send(Event::Detect(DetectEvent::Completed {
        accepted: detection.accepted_count(),
        rejected: detection.rejected_count(),
    }));
}

fn announce_collisions(plan: &TransferPlan, events: &EventSender) {
    for collision in &plan.collisions {
        events.send(Event::Transfer(TransferEvent::CollisionResolved(
            collision.clone(),
        )));
    }
}
