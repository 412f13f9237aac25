//! Crash-safe execution of a single transfer.
//!
//! Copies are staged in a hidden temporary sibling of the destination and
//! renamed into place, so the destination is never observed half-written.
//! Moves rename when they can and fall back to the staged copy followed by
//! removal of the source.

use super::probe::DestinationState;
use super::types::*;
use crate::error::TransferError;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::Path;

const STAGING_PREFIX: &str = ".stackcopy-";
const STAGING_SUFFIX: &str = ".partial";

/// Executes transfer operations
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferEngine {
    dry_run: bool,
    force: bool,
}

impl TransferEngine {
    pub fn new(dry_run: bool, force: bool) -> Self {
        Self { dry_run, force }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute one operation.
    ///
    /// A zero-byte destination is replaced, an identical one short-circuits
    /// (a move still removes its source), and a different one is a
    /// collision unless `force` is set. In a dry run every check runs but
    /// nothing is written, renamed or removed.
    pub fn execute(&self, op: &TransferOp) -> Result<TransferOutcome, TransferError> {
        let source_meta = match fs::metadata(&op.source) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TransferError::SourceMissing {
                    path: op.source.clone(),
                })
            }
            Err(e) => return Err(TransferError::io(&op.source, e)),
        };

        if op.source == op.destination {
            return Ok(self.outcome(TransferAction::Deduplicated));
        }

        let state = DestinationState::probe(&op.source, &op.destination)
            .map_err(|e| TransferError::io(&op.destination, e))?;

        let action = match state {
            DestinationState::Absent => TransferAction::Transferred,
            DestinationState::ZeroByte => TransferAction::Healed,
            DestinationState::Identical => TransferAction::Deduplicated,
            DestinationState::Different if self.force => TransferAction::Overwritten,
            DestinationState::Different => {
                return Err(TransferError::Collision {
                    source_path: op.source.clone(),
                    destination: op.destination.clone(),
                })
            }
        };

        if self.dry_run {
            return Ok(self.outcome(action));
        }

        if action == TransferAction::Deduplicated {
            if op.mode == TransferMode::Move {
                fs::remove_file(&op.source).map_err(|e| TransferError::io(&op.source, e))?;
            }
            tracing::debug!(
                source = %op.source.display(),
                destination = %op.destination.display(),
                "Destination already identical"
            );
            return Ok(self.outcome(action));
        }

        if action == TransferAction::Healed {
            tracing::info!(
                destination = %op.destination.display(),
                "Replacing zero-byte leftover"
            );
        }

        if let Some(parent) = op.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
        }

        match op.mode {
            TransferMode::Copy => copy_atomic(&op.source, &op.destination, &source_meta)?,
            TransferMode::Move => move_atomic(&op.source, &op.destination, &source_meta)?,
        }

        tracing::debug!(
            source = %op.source.display(),
            destination = %op.destination.display(),
            action = ?action,
            "Transferred"
        );

        Ok(self.outcome(action))
    }

    fn outcome(&self, action: TransferAction) -> TransferOutcome {
        TransferOutcome {
            action,
            dry_run: self.dry_run,
        }
    }
}

/// Copy into a temporary sibling, then rename it over `destination`.
///
/// The temporary file is removed if anything fails before the rename.
fn copy_atomic(
    source: &Path,
    destination: &Path,
    source_meta: &fs::Metadata,
) -> Result<(), TransferError> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));

    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| TransferError::io(parent, e))?;

    let mut reader = File::open(source).map_err(|e| TransferError::io(source, e))?;
    io::copy(&mut reader, staged.as_file_mut()).map_err(|e| TransferError::io(destination, e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| TransferError::io(destination, e))?;

    // Keep the camera's timestamp: later runs sequence on it
    if let Ok(modified) = source_meta.modified() {
        filetime::set_file_handle_times(
            staged.as_file(),
            None,
            Some(FileTime::from_system_time(modified)),
        )
        .map_err(|e| TransferError::io(destination, e))?;
    }
    fs::set_permissions(staged.path(), source_meta.permissions())
        .map_err(|e| TransferError::io(destination, e))?;

    staged
        .persist(destination)
        .map_err(|e| TransferError::io(destination, e.error))?;
    Ok(())
}

/// Rename, or staged copy plus source removal when the destination is on
/// another filesystem
fn move_atomic(
    source: &Path,
    destination: &Path,
    source_meta: &fs::Metadata,
) -> Result<(), TransferError> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            tracing::warn!(
                source = %source.display(),
                error = %e,
                "Rename crosses filesystems, falling back to copy and delete"
            );
            copy_then_remove(source, destination, source_meta)
        }
        Err(e) => Err(TransferError::io(destination, e)),
    }
}

/// Staged copy, then removal of the source once the destination is complete
fn copy_then_remove(
    source: &Path,
    destination: &Path,
    source_meta: &fs::Metadata,
) -> Result<(), TransferError> {
    copy_atomic(source, destination, source_meta).map_err(|e| match e {
        TransferError::Io { source: io, .. } => TransferError::CrossDeviceFallback {
            path: source.to_path_buf(),
            source: io,
        },
        other => other,
    })?;

    verify_length(destination, source_meta.len())?;
    fs::remove_file(source).map_err(|e| TransferError::io(source, e))
}

/// A destination shorter or longer than expected is removed again
fn verify_length(destination: &Path, expected: u64) -> Result<(), TransferError> {
    let actual = fs::metadata(destination)
        .map_err(|e| TransferError::io(destination, e))?
        .len();
    if actual != expected {
        let _ = fs::remove_file(destination);
        return Err(TransferError::VerificationFailed {
            path: destination.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn op(source: PathBuf, destination: PathBuf, mode: TransferMode) -> TransferOp {
        TransferOp {
            source,
            destination,
            mode,
            category: Category::Input,
            stem: "img_0100".to_string(),
        }
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("IMG_0100.ORF");
        fs::write(&src, b"raw frame").unwrap();
        let dest = dir.path().join("2024/2024-07-03/IMG_0100.ORF");
        (dir, src, dest)
    }

    fn staging_leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn copy_creates_destination_and_keeps_source() {
        let (_dir, src, dest) = setup();
        let outcome = TransferEngine::default()
            .execute(&op(src.clone(), dest.clone(), TransferMode::Copy))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Transferred);
        assert!(!outcome.dry_run);
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"raw frame");
        assert_eq!(staging_leftovers(dest.parent().unwrap()), 0);
    }

    #[test]
    fn copy_preserves_modification_time() {
        let (_dir, src, dest) = setup();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        TransferEngine::default()
            .execute(&op(src, dest.clone(), TransferMode::Copy))
            .unwrap();

        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn move_renames_source() {
        let (_dir, src, dest) = setup();
        let outcome = TransferEngine::default()
            .execute(&op(src.clone(), dest.clone(), TransferMode::Move))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Transferred);
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"raw frame");
    }

    #[test]
    fn zero_byte_destination_is_healed() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"").unwrap();

        let outcome = TransferEngine::default()
            .execute(&op(src, dest.clone(), TransferMode::Copy))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Healed);
        assert_eq!(fs::read(&dest).unwrap(), b"raw frame");
    }

    #[test]
    fn identical_copy_writes_nothing() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"raw frame").unwrap();
        let marker = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&dest, marker).unwrap();

        let outcome = TransferEngine::default()
            .execute(&op(src.clone(), dest.clone(), TransferMode::Copy))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Deduplicated);
        assert!(src.exists());
        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), marker);
    }

    #[test]
    fn identical_move_removes_source() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"raw frame").unwrap();

        let outcome = TransferEngine::default()
            .execute(&op(src.clone(), dest.clone(), TransferMode::Move))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Deduplicated);
        assert!(!src.exists());
        assert!(dest.exists());
    }

    #[test]
    fn different_destination_is_a_collision() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"another frame").unwrap();

        let err = TransferEngine::default()
            .execute(&op(src.clone(), dest.clone(), TransferMode::Move))
            .unwrap_err();

        assert!(err.is_collision());
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"another frame");
    }

    #[test]
    fn force_overwrites_different_destination() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"another frame").unwrap();

        let outcome = TransferEngine::new(false, true)
            .execute(&op(src.clone(), dest.clone(), TransferMode::Copy))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Overwritten);
        assert_eq!(fs::read(&dest).unwrap(), b"raw frame");
    }

    #[test]
    fn dry_run_changes_nothing() {
        let (_dir, src, dest) = setup();
        let outcome = TransferEngine::new(true, false)
            .execute(&op(src.clone(), dest.clone(), TransferMode::Move))
            .unwrap();

        assert_eq!(outcome.action, TransferAction::Transferred);
        assert!(outcome.dry_run);
        assert!(src.exists());
        assert!(!dest.exists());
        assert!(!dest.parent().unwrap().exists());
    }

    #[test]
    fn dry_run_still_reports_collisions() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"another frame").unwrap();

        let result = TransferEngine::new(true, false).execute(&op(src, dest, TransferMode::Copy));
        assert!(matches!(result, Err(TransferError::Collision { .. })));
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = TransferEngine::default().execute(&op(
            dir.path().join("gone.ORF"),
            dir.path().join("out/gone.ORF"),
            TransferMode::Move,
        ));
        assert!(matches!(result, Err(TransferError::SourceMissing { .. })));
    }

    #[test]
    fn copy_atomic_replaces_existing_file_whole() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old contents that are longer").unwrap();

        let meta = fs::metadata(&src).unwrap();
        copy_atomic(&src, &dest, &meta).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"raw frame");
        assert_eq!(staging_leftovers(dest.parent().unwrap()), 0);
        let age = SystemTime::now()
            .duration_since(fs::metadata(&dest).unwrap().modified().unwrap())
            .unwrap_or(Duration::ZERO);
        assert!(age < Duration::from_secs(3600));
    }

    #[test]
    fn copy_then_remove_drops_source_after_full_copy() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        let meta = fs::metadata(&src).unwrap();
        copy_then_remove(&src, &dest, &meta).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"raw frame");
        let dest_meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dest_meta), old);
    }

    #[test]
    fn copy_then_remove_keeps_source_when_copy_fails() {
        let (_dir, src, dest) = setup();
        // A directory cannot be replaced by the staged file
        fs::create_dir_all(dest.join("occupied")).unwrap();

        let meta = fs::metadata(&src).unwrap();
        let result = copy_then_remove(&src, &dest, &meta);

        assert!(matches!(result, Err(TransferError::CrossDeviceFallback { .. })));
        assert_eq!(fs::read(&src).unwrap(), b"raw frame");
        assert!(dest.is_dir());
        assert_eq!(staging_leftovers(dest.parent().unwrap()), 0);
    }

    #[test]
    fn short_destination_fails_verification_and_is_removed() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"raw").unwrap();

        let expected = fs::metadata(&src).unwrap().len();
        let result = verify_length(&dest, expected);

        assert!(matches!(
            result,
            Err(TransferError::VerificationFailed { expected: 9, actual: 3, .. })
        ));
        assert!(!dest.exists());
        assert!(src.exists());
    }

    #[test]
    fn move_onto_directory_fails_without_fallback() {
        let (_dir, src, dest) = setup();
        fs::create_dir_all(dest.join("occupied")).unwrap();

        let result = TransferEngine::new(false, true)
            .execute(&op(src.clone(), dest.clone(), TransferMode::Move));

        assert!(matches!(result, Err(TransferError::Io { .. })));
        assert!(src.exists());
        assert!(dest.is_dir());
    }
}
