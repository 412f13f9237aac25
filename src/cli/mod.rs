//! # CLI Module
//!
//! Command-line interface for stackcopy.
//!
//! ## Usage
//! ```bash
//! # Copy orphan JPEGs (stack outputs) somewhere else
//! stackcopy copy ~/card ~/stacked
//!
//! # Rename them in place with " stacked"
//! stackcopy rename ~/card --prefix focus
//!
//! # Detect stacks and move their input frames aside
//! stackcopy lightroom ~/card --today
//!
//! # The same, then import everything into dated Lightroom folders
//! stackcopy lightroom-import ~/card --lightroom-root ~/Pictures/Lightroom
//!
//! # JSON output
//! stackcopy lightroom ~/card --dry-run --output json
//! ```

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use stackcopy::core::pipeline::{PipelineBuilder, RunConfig, RunMode, RunReport};
use stackcopy::core::transfer::{TransferAction, TransferMode, TransferOp, TransferOutcome};
use stackcopy::error::{ConfigError, Result};
use stackcopy::events::{DetectEvent, Event, EventChannel, PipelineEvent, TransferEvent};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

/// stackcopy - Sort in-camera focus stacks out of a card dump
#[derive(Parser, Debug)]
#[command(name = "stackcopy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy JPEGs that have no matching raw file into DEST
    Copy {
        /// Directory to read
        source: PathBuf,
        /// Directory to copy into (created if missing)
        destination: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Rename JPEGs that have no matching raw file in place, adding " stacked"
    Rename {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Copy JPEGs that have no matching raw file into DIR/stacked, adding " stacked"
    Stackcopy {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Detect stacks, move their input frames to the input root and mark the outputs
    Lightroom {
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Where input frames go (default: DIR/stack-inputs)
        #[arg(long)]
        input_root: Option<PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Lightroom mode, then move outputs and all other files into dated Lightroom folders
    LightroomImport {
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Root of the dated Lightroom folders
        #[arg(long)]
        lightroom_root: PathBuf,
        /// Where input frames go (default: DIR/stack-inputs)
        #[arg(long)]
        input_root: Option<PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Only process files modified today
    #[arg(long, conflicts_with_all = ["yesterday", "date"])]
    today: bool,

    /// Only process files modified yesterday
    #[arg(long, conflicts_with = "date")]
    yesterday: bool,

    /// Only process files modified on this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<String>,

    /// Text placed before " stacked" in new names
    #[arg(long)]
    prefix: Option<String>,

    /// Worker threads (default: available cores, at least 2)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Show what would happen without changing anything
    #[arg(long, visible_alias = "dry")]
    dry_run: bool,

    /// Overwrite destinations that hold different content
    #[arg(long)]
    force: bool,

    /// Print every file action
    #[arg(short, long)]
    verbose: bool,

    /// Print detector decisions and debug logs
    #[arg(long)]
    debug: bool,

    /// Include hidden files
    #[arg(long)]
    include_hidden: bool,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON report for scripting
    Json,
}

/// Run the CLI and map the outcome to an exit code
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            Term::stderr()
                .write_line(&format!("{} {}", style("error:").red().bold(), e))
                .ok();
            ExitCode::from(2)
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let (config, common) = build_config(cli.command)?;

    let level = if common.debug {
        "debug"
    } else if common.verbose {
        "info"
    } else {
        "warn"
    };
    stackcopy::init_tracing(level);

    let pipeline = PipelineBuilder::from_config(config).build()?;
    let term = Term::stdout();
    let pretty = matches!(common.output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {} {}",
            style("stackcopy").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
            style(pipeline.config().mode.to_string()).yellow()
        ))
        .ok();
        if pipeline.config().dry_run {
            term.write_line(&format!(
                "{}",
                style("Dry run: nothing will be changed").yellow()
            ))
            .ok();
        }
        term.write_line("").ok();
    }

    let (sender, receiver) = EventChannel::new();

    let progress = if pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let show_files = common.verbose || common.dry_run;
    let show_rejections = common.debug;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let say = |line: String| {
            if let Some(pb) = &progress_clone {
                pb.println(line);
            }
        };
        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_message(phase.to_string());
                    }
                }
                Event::Transfer(TransferEvent::Started { total }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(total as u64);
                        pb.set_position(0);
                    }
                }
                Event::Transfer(TransferEvent::Progress(p)) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_position(p.completed as u64);
                    }
                }
                // Collisions are announced even without --verbose
                Event::Transfer(TransferEvent::CollisionResolved(c)) => {
                    for (planned, used) in &c.renamed {
                        say(format!(
                            "{} {} taken, using {}",
                            style("collision:").yellow().bold(),
                            display_path(planned),
                            file_name(used)
                        ));
                    }
                }
                Event::Transfer(TransferEvent::FileDone { op, outcome }) if show_files => {
                    say(describe(&op, &outcome));
                }
                Event::Transfer(TransferEvent::FileFailed { op, message }) => {
                    say(format!(
                        "{} {}: {}",
                        style("failed:").red().bold(),
                        file_name(&op.source),
                        message
                    ));
                }
                Event::Detect(DetectEvent::StackAccepted {
                    output,
                    inputs,
                    first_frame,
                    last_frame,
                }) if show_files || show_rejections => {
                    say(format!(
                        "{} {} <- {} frames ({}..{})",
                        style("stack:").green(),
                        file_name(&output),
                        inputs,
                        first_frame,
                        last_frame
                    ));
                }
                Event::Detect(DetectEvent::StackRejected {
                    output,
                    inputs,
                    reason,
                }) if show_rejections => {
                    say(format!(
                        "{} {} ({} frames): {}",
                        style("rejected:").dim(),
                        file_name(&output),
                        inputs,
                        reason
                    ));
                }
                Event::Pipeline(PipelineEvent::Completed { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = result?;
    match common.output {
        OutputFormat::Pretty => print_pretty_report(&term, &report),
        OutputFormat::Json => print_json_report(&report),
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Turn parsed arguments into a run configuration
fn build_config(command: Commands) -> std::result::Result<(RunConfig, CommonArgs), ConfigError> {
    let (source, mode, input_root, lightroom_root, common) = match command {
        Commands::Copy {
            source,
            destination,
            common,
        } => (
            source,
            RunMode::Copy {
                destination: expand_tilde(destination),
            },
            None,
            None,
            common,
        ),
        Commands::Rename { dir, common } => (dir, RunMode::Rename, None, None, common),
        Commands::Stackcopy { dir, common } => (dir, RunMode::StackCopy, None, None, common),
        Commands::Lightroom {
            dir,
            input_root,
            common,
        } => (dir, RunMode::Lightroom, input_root, None, common),
        Commands::LightroomImport {
            dir,
            lightroom_root,
            input_root,
            common,
        } => (
            dir,
            RunMode::LightroomImport,
            input_root,
            Some(lightroom_root),
            common,
        ),
    };

    let mut config = RunConfig::new(expand_tilde(source), mode);
    config.date_filter = date_filter(&common, Local::now().date_naive())?;
    config.prefix = common.prefix.clone().filter(|p| !p.trim().is_empty());
    if let Some(jobs) = common.jobs {
        config.jobs = jobs;
    }
    config.dry_run = common.dry_run;
    config.force = common.force;
    config.include_hidden = common.include_hidden;
    config.input_root = input_root.map(expand_tilde);
    config.lightroom_root = lightroom_root.map(expand_tilde);
    Ok((config, common))
}

/// The date selected by `--today`, `--yesterday` or `--date`
fn date_filter(
    common: &CommonArgs,
    today: NaiveDate,
) -> std::result::Result<Option<NaiveDate>, ConfigError> {
    if common.today {
        return Ok(Some(today));
    }
    if common.yesterday {
        return Ok(today.pred_opt());
    }
    match &common.date {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ConfigError::InvalidDate {
                value: value.clone(),
            }),
        None => Ok(None),
    }
}

fn expand_tilde(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path,
    }
}

fn describe(op: &TransferOp, outcome: &TransferOutcome) -> String {
    let verb = match (outcome.action, op.mode, outcome.dry_run) {
        (TransferAction::Deduplicated, _, _) => "already present",
        (TransferAction::Healed, _, false) => "replaced empty",
        (TransferAction::Healed, _, true) => "would replace empty",
        (TransferAction::Overwritten, _, false) => "overwrote",
        (TransferAction::Overwritten, _, true) => "would overwrite",
        (TransferAction::Transferred, TransferMode::Move, false) => "moved",
        (TransferAction::Transferred, TransferMode::Move, true) => "would move",
        (TransferAction::Transferred, TransferMode::Copy, false) => "copied",
        (TransferAction::Transferred, TransferMode::Copy, true) => "would copy",
    };
    format!(
        "  {} {} -> {}",
        style(format!("{} {}:", op.category, verb)).dim(),
        file_name(&op.source),
        display_path(&op.destination)
    )
}

fn print_pretty_report(term: &Term, report: &RunReport) {
    let summary = &report.summary;
    let heading = if summary.dry_run {
        "Dry Run Complete"
    } else {
        "Run Complete"
    };
    term.write_line(&format!("{} {}", style("✓").green().bold(), heading))
        .ok();
    term.write_line("").ok();

    if report.mode.detects_stacks() {
        term.write_line(&format!(
            "  {} stacks accepted, {} rejected",
            style(summary.stacks_accepted).cyan(),
            style(summary.stacks_rejected).dim()
        ))
        .ok();
    }

    let written = if summary.dry_run {
        "files would be transferred"
    } else {
        "files transferred"
    };
    term.write_line(&format!(
        "  {} {} in {:.1}s",
        style(summary.transferred).cyan(),
        written,
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();

    if summary.deduplicated > 0 {
        term.write_line(&format!(
            "  {} already at their destination",
            style(summary.deduplicated).dim()
        ))
        .ok();
    }
    if summary.healed > 0 {
        term.write_line(&format!(
            "  {} empty leftovers replaced",
            style(summary.healed).yellow()
        ))
        .ok();
    }
    if summary.overwritten > 0 {
        term.write_line(&format!(
            "  {} destinations overwritten",
            style(summary.overwritten).yellow()
        ))
        .ok();
    }
    if summary.skipped_processed > 0 {
        term.write_line(&format!(
            "  {} files already marked stacked, skipped",
            style(summary.skipped_processed).dim()
        ))
        .ok();
    }

    if !report.collisions.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Renamed to avoid collisions:").bold()))
            .ok();
        for collision in &report.collisions {
            for (planned, used) in &collision.renamed {
                term.write_line(&format!(
                    "  {} -> {}",
                    display_path(planned),
                    file_name(used)
                ))
                .ok();
            }
        }
    }

    if !report.failures.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{} {}",
            style(report.failures.len()).red().bold(),
            style("files failed:").red().bold()
        ))
        .ok();
        for failure in &report.failures {
            term.write_line(&format!(
                "  {} {}",
                style("✗").red(),
                failure.message
            ))
            .ok();
        }
    }

    if !report.partial_stacks.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{}",
            style("Only partly transferred (rerun to finish):").yellow().bold()
        ))
        .ok();
        for (stem, outcome) in &report.partial_stacks {
            term.write_line(&format!(
                "  {} {}/{} files",
                stem, outcome.succeeded, outcome.expected
            ))
            .ok();
        }
    }

    for error in &report.plan_errors {
        term.write_line(&format!("  {} {}", style("!").yellow(), error))
            .ok();
    }

    if summary.dry_run {
        term.write_line("").ok();
        term.write_line(&format!(
            "{}",
            style("Dry run: no files were changed.").dim()
        ))
        .ok();
    }
}

fn print_json_report(report: &RunReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "Could not serialize report"),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Shorten paths under the home directory to `~/...`
fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}
