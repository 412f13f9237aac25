//! # Catalog Module
//!
//! Reads one flat directory of camera output and indexes the raw and JPEG
//! files by stem.
//!
//! ## Recognised Files
//! - Raw: ORF, CR2, CR3, NEF, ARW, DNG, PEF, RW2, RAF, RAW, SR2
//! - JPEG: JPG, JPEG
//!
//! Matching is case-insensitive on the stem only, so `IMG_0100.orf` pairs
//! with `img_0100.JPG`.
//!
//! ## Example
//! ```rust,ignore
//! use stackcopy::core::catalog::{Catalog, CatalogOptions};
//!
//! let catalog = Catalog::scan(Path::new("/card/DCIM/100OMSYS"), &CatalogOptions::default())?;
//! for jpeg in catalog.orphan_jpegs() {
//!     println!("{}", jpeg.file_name());
//! }
//! ```

mod filter;
mod record;
mod walker;

pub use filter::{
    camera_stem, is_already_processed, numeric_stem, stacked_file_name, FileKind,
    JPEG_EXTENSIONS, RAW_EXTENSIONS, STACKED_MARKER,
};
pub use record::FileRecord;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Options for a catalog scan
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Keep JPEGs that already carry the `stacked` marker
    pub include_processed: bool,
    /// Keep files whose name starts with `.`
    pub include_hidden: bool,
}

/// Raw and JPEG files of one directory, indexed by stem
#[derive(Debug)]
pub struct Catalog {
    root: PathBuf,
    records: Vec<FileRecord>,
    by_stem: HashMap<String, Vec<usize>>,
    raw_stems: HashSet<String>,
    skipped_processed: usize,
}

impl Catalog {
    /// Scan `dir` (non-recursively)
    pub fn scan(dir: &Path, options: &CatalogOptions) -> Result<Self, crate::error::ScanError> {
        walker::scan_directory(dir, options)
    }

    /// Index records that were gathered elsewhere
    pub fn from_records(root: impl Into<PathBuf>, mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        let mut by_stem: HashMap<String, Vec<usize>> = HashMap::new();
        let mut raw_stems = HashSet::new();
        for (index, record) in records.iter().enumerate() {
            by_stem
                .entry(record.stem_key().to_string())
                .or_default()
                .push(index);
            if record.is_raw() {
                raw_stems.insert(record.stem_key().to_string());
            }
        }

        Self {
            root: root.into(),
            records,
            by_stem,
            raw_stems,
            skipped_processed: 0,
        }
    }

    pub(crate) fn with_skipped_processed(mut self, skipped: usize) -> Self {
        self.skipped_processed = skipped;
        self
    }

    /// The scanned directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All records, sorted by file name
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn raw_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|r| r.is_raw())
    }

    pub fn jpeg_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|r| r.is_jpeg())
    }

    /// Whether any raw file has this (lowercase) stem
    pub fn has_raw(&self, stem_key: &str) -> bool {
        self.raw_stems.contains(stem_key)
    }

    /// Every record sharing this (lowercase) stem
    pub fn records_for<'a>(&'a self, stem_key: &str) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.by_stem
            .get(stem_key)
            .into_iter()
            .flatten()
            .map(move |&i| &self.records[i])
    }

    /// JPEGs with no raw file of the same stem
    pub fn orphan_jpegs(&self) -> impl Iterator<Item = &FileRecord> {
        self.jpeg_files().filter(move |r| !self.has_raw(r.stem_key()))
    }

    /// Already-processed JPEGs left out of this scan
    pub fn skipped_processed(&self) -> usize {
        self.skipped_processed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
