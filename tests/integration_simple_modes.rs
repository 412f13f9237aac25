//! Integration tests for the copy, rename and stackcopy modes.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{DateTime, Local};
use filetime::{set_file_mtime, FileTime};
use predicates::prelude::*;
use stackcopy::core::pipeline::{Pipeline, RunMode, RunReport};
use stackcopy::error::{ConfigError, StackCopyError};

const BASE: i64 = 1_717_236_000;

fn shoot(dir: &TempDir, name: &str, offset: i64) {
    let child = dir.child(name);
    child.write_str(&format!("{} pixels", name)).unwrap();
    set_file_mtime(child.path(), FileTime::from_unix_time(BASE + offset, 0)).unwrap();
}

/// A card with two plain pairs and two camera composites
fn card() -> TempDir {
    let temp = TempDir::new().unwrap();
    shoot(&temp, "P6010001.ORF", 0);
    shoot(&temp, "P6010001.JPG", 0);
    shoot(&temp, "P6010002.orf", 10);
    shoot(&temp, "P6010002.jpg", 10);
    shoot(&temp, "P6010003.JPG", 20);
    shoot(&temp, "P6010004.JPG", 30);
    temp
}

fn run(source: &TempDir, mode: RunMode) -> RunReport {
    Pipeline::builder()
        .source(source.path())
        .mode(mode)
        .build()
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn copy_copies_only_jpegs_without_raw() {
    let source = card();
    let dest = TempDir::new().unwrap();

    let report = run(
        &source,
        RunMode::Copy {
            destination: dest.path().to_path_buf(),
        },
    );

    assert_eq!(report.summary.transferred, 2);
    dest.child("P6010003.JPG").assert("P6010003.JPG pixels");
    dest.child("P6010004.JPG").assert(predicate::path::exists());
    dest.child("P6010001.JPG").assert(predicate::path::missing());
    dest.child("P6010002.jpg").assert(predicate::path::missing());
    // Copies leave the source alone
    source.child("P6010003.JPG").assert(predicate::path::exists());
}

#[test]
fn copy_preserves_modification_time() {
    let source = card();
    let dest = TempDir::new().unwrap();

    run(
        &source,
        RunMode::Copy {
            destination: dest.path().to_path_buf(),
        },
    );

    let meta = std::fs::metadata(dest.child("P6010004.JPG").path()).unwrap();
    assert_eq!(
        FileTime::from_last_modification_time(&meta).unix_seconds(),
        BASE + 30
    );
}

#[test]
fn copy_twice_is_idempotent() {
    let source = card();
    let dest = TempDir::new().unwrap();
    let mode = RunMode::Copy {
        destination: dest.path().to_path_buf(),
    };

    run(&source, mode.clone());
    let second = run(&source, mode);

    assert_eq!(second.summary.transferred, 0);
    assert_eq!(second.summary.deduplicated, 2);
    assert_eq!(second.summary.failed, 0);
}

#[test]
fn copy_creates_missing_destination() {
    let source = card();
    let parent = TempDir::new().unwrap();
    let dest = parent.child("nested").child("stacks");

    run(
        &source,
        RunMode::Copy {
            destination: dest.path().to_path_buf(),
        },
    );

    dest.child("P6010003.JPG").assert(predicate::path::exists());
}

#[test]
fn copy_with_prefix_renames() {
    let source = card();
    let dest = TempDir::new().unwrap();

    Pipeline::builder()
        .source(source.path())
        .mode(RunMode::Copy {
            destination: dest.path().to_path_buf(),
        })
        .prefix(Some("macro".to_string()))
        .build()
        .unwrap()
        .run()
        .unwrap();

    dest.child("P6010003 macro stacked.JPG")
        .assert(predicate::path::exists());
}

#[test]
fn copy_collision_needs_force() {
    let source = card();
    let dest = TempDir::new().unwrap();
    dest.child("P6010003.JPG").write_str("something else").unwrap();

    let report = run(
        &source,
        RunMode::Copy {
            destination: dest.path().to_path_buf(),
        },
    );
    assert_eq!(report.summary.failed, 1);
    assert!(report.failures[0].collision);
    assert!(report.collisions.is_empty());
    dest.child("P6010003.JPG").assert("something else");
    dest.child("P6010004.JPG").assert(predicate::path::exists());

    let forced = Pipeline::builder()
        .source(source.path())
        .mode(RunMode::Copy {
            destination: dest.path().to_path_buf(),
        })
        .force(true)
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(forced.summary.overwritten, 1);
    dest.child("P6010003.JPG").assert("P6010003.JPG pixels");
}

#[test]
fn copy_into_source_is_rejected() {
    let source = card();
    let result = Pipeline::builder()
        .source(source.path())
        .mode(RunMode::Copy {
            destination: source.path().to_path_buf(),
        })
        .build();

    assert!(matches!(
        result,
        Err(StackCopyError::Config(ConfigError::SameSourceAndDestination { .. }))
    ));
}

#[test]
fn rename_marks_orphans_in_place() {
    let source = card();

    let report = run(&source, RunMode::Rename);

    assert_eq!(report.summary.transferred, 2);
    source
        .child("P6010003 stacked.JPG")
        .assert("P6010003.JPG pixels");
    source.child("P6010004 stacked.JPG").assert(predicate::path::exists());
    source.child("P6010003.JPG").assert(predicate::path::missing());
    source.child("P6010001.JPG").assert(predicate::path::exists());
}

#[test]
fn rename_skips_already_marked_files() {
    let source = card();
    run(&source, RunMode::Rename);

    let second = run(&source, RunMode::Rename);

    assert!(second.ops.is_empty());
    assert_eq!(second.summary.skipped_processed, 2);
    source
        .child("P6010003 stacked stacked.JPG")
        .assert(predicate::path::missing());
}

#[test]
fn rename_with_date_filter_is_rejected() {
    let source = card();
    let result = Pipeline::builder()
        .source(source.path())
        .mode(RunMode::Rename)
        .date_filter(Some(Local::now().date_naive()))
        .build();

    assert!(matches!(
        result,
        Err(StackCopyError::Config(ConfigError::DateFilterWithRename))
    ));
}

#[test]
fn stackcopy_copies_into_stacked_subdirectory() {
    let source = card();

    let report = run(&source, RunMode::StackCopy);

    assert_eq!(report.summary.transferred, 2);
    source
        .child("stacked")
        .child("P6010003 stacked.JPG")
        .assert(predicate::path::exists());
    source.child("P6010003.JPG").assert(predicate::path::exists());
}

#[test]
fn date_filter_limits_the_run() {
    let source = card();
    // A composite from another day
    shoot(&source, "P5010009.JPG", -3 * 86_400);
    let day = DateTime::from_timestamp(BASE, 0)
        .unwrap()
        .with_timezone(&Local)
        .date_naive();

    let report = Pipeline::builder()
        .source(source.path())
        .mode(RunMode::StackCopy)
        .date_filter(Some(day))
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.summary.transferred, 2);
    source
        .child("stacked")
        .child("P5010009 stacked.JPG")
        .assert(predicate::path::missing());
}

#[test]
fn dry_run_copy_creates_nothing() {
    let source = card();
    let parent = TempDir::new().unwrap();
    let dest = parent.child("out");

    let report = Pipeline::builder()
        .source(source.path())
        .mode(RunMode::Copy {
            destination: dest.path().to_path_buf(),
        })
        .dry_run(true)
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.ops.len(), 2);
    assert_eq!(report.summary.transferred, 2);
    dest.assert(predicate::path::missing());
}
