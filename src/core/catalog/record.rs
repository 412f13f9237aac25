//! The per-file record produced by a catalog scan.

use super::filter::{self, FileKind};
use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

/// One raw or JPEG file in the scanned directory.
///
/// Immutable after construction. The modification time is read from disk on
/// first access and cached, so records that never reach the timestamp checks
/// never cost a `stat`.
#[derive(Debug)]
pub struct FileRecord {
    path: PathBuf,
    file_name: String,
    stem: String,
    stem_key: String,
    extension: String,
    kind: FileKind,
    numeric_stem: Option<u64>,
    processed: bool,
    modified: OnceLock<Option<SystemTime>>,
}

impl FileRecord {
    /// Build a record for a raw or JPEG path. Other files yield `None`.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = FileKind::from_path(&path)?;
        let file_name = path.file_name()?.to_str()?.to_string();
        let stem = path.file_stem()?.to_str()?.to_string();
        let extension = path.extension()?.to_str()?.to_string();

        Some(Self {
            stem_key: stem.to_lowercase(),
            numeric_stem: filter::numeric_stem(&stem),
            processed: kind == FileKind::Jpeg && filter::is_already_processed(&stem),
            path,
            file_name,
            stem,
            extension,
            kind,
            modified: OnceLock::new(),
        })
    }

    /// Build a record with a known modification time (no disk access)
    pub fn with_modified(path: impl Into<PathBuf>, modified: SystemTime) -> Option<Self> {
        let record = Self::new(path)?;
        let _ = record.modified.set(Some(modified));
        Some(record)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Stem as written on disk
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Lowercase stem, the key raw/JPEG pairs are matched on
    pub fn stem_key(&self) -> &str {
        &self.stem_key
    }

    /// Extension as written on disk, without the dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn is_raw(&self) -> bool {
        self.kind == FileKind::Raw
    }

    pub fn is_jpeg(&self) -> bool {
        self.kind == FileKind::Jpeg
    }

    pub fn numeric_stem(&self) -> Option<u64> {
        self.numeric_stem
    }

    /// JPEG already renamed with the `stacked` marker by an earlier run
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Modification time, read once and cached
    pub fn modified(&self) -> Option<SystemTime> {
        *self
            .modified
            .get_or_init(|| fs::metadata(&self.path).and_then(|m| m.modified()).ok())
    }

    /// Local calendar date of the modification time
    pub fn modified_date(&self) -> Option<NaiveDate> {
        self.modified().map(|t| DateTime::<Local>::from(t).date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn record_splits_name_parts() {
        let record = FileRecord::new("/card/DCIM/IMG_0100.ORF").unwrap();
        assert_eq!(record.file_name(), "IMG_0100.ORF");
        assert_eq!(record.stem(), "IMG_0100");
        assert_eq!(record.stem_key(), "img_0100");
        assert_eq!(record.extension(), "ORF");
        assert_eq!(record.numeric_stem(), Some(100));
        assert!(record.is_raw());
        assert!(!record.is_processed());
    }

    #[test]
    fn record_rejects_other_files() {
        assert!(FileRecord::new("/card/notes.txt").is_none());
        assert!(FileRecord::new("/card/README").is_none());
    }

    #[test]
    fn processed_flag_only_applies_to_jpegs() {
        let jpeg = FileRecord::new("/card/IMG_0105 stacked.JPG").unwrap();
        assert!(jpeg.is_processed());
        assert_eq!(jpeg.numeric_stem(), Some(105));

        let raw = FileRecord::new("/card/stacked test.ORF").unwrap();
        assert!(!raw.is_processed());
    }

    #[test]
    fn preset_modified_time_is_returned() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let record = FileRecord::with_modified("/nowhere/IMG_0001.JPG", time).unwrap();
        assert_eq!(record.modified(), Some(time));
    }

    #[test]
    fn modified_time_is_cached_after_first_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMG_0001.JPG");
        fs::write(&path, b"jpeg").unwrap();

        let record = FileRecord::new(&path).unwrap();
        let first = record.modified();
        assert!(first.is_some());

        // Deleting the file does not change the cached answer
        fs::remove_file(&path).unwrap();
        assert_eq!(record.modified(), first);
    }

    #[test]
    fn missing_file_has_no_modified_time() {
        let record = FileRecord::new("/nonexistent/path/IMG_0001.JPG").unwrap();
        assert_eq!(record.modified(), None);
        assert_eq!(record.modified_date(), None);
    }
}
