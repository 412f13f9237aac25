//! Filename classification for the catalog.
//!
//! Everything here is derived from the name alone: extension, stem and the
//! numeric frame counter cameras put at the end of the stem.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Raw formats recognised by extension (lowercase, without the dot)
pub const RAW_EXTENSIONS: &[&str] = &[
    "orf", "cr2", "cr3", "nef", "arw", "dng", "pef", "rw2", "raf", "raw", "sr2",
];

/// JPEG extensions (lowercase, without the dot)
pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Word that marks a JPEG as an already processed stack output
pub const STACKED_MARKER: &str = "stacked";

/// What a catalogued file is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Raw,
    Jpeg,
}

impl FileKind {
    /// Classify by extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        if RAW_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Raw)
        } else if JPEG_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Jpeg)
        } else {
            None
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

fn stacked_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bstacked\b").expect("static regex is valid"))
}

/// Whether a stem already carries the `stacked` marker as a whole word.
///
/// Matches `IMG_0105 stacked`, `stacked-photo`, `Stacked image`; does not
/// match `unstacked` or `IMG_stacked` (underscore is a word character).
pub fn is_already_processed(stem: &str) -> bool {
    stacked_word().is_match(stem)
}

/// The stem the camera wrote, before any marker or prefix was appended.
///
/// Renamed outputs look like `IMG_0105 focus stacked`; the camera stem is
/// everything before the first whitespace.
pub fn camera_stem(stem: &str) -> &str {
    if is_already_processed(stem) {
        stem.split_whitespace().next().unwrap_or(stem)
    } else {
        stem
    }
}

/// Parse the frame counter from a stem.
///
/// Returns the trailing run of ASCII digits of the camera stem as an
/// integer, or `None` when there is no such run or it does not fit in a
/// `u64`. Pure and total.
pub fn numeric_stem(stem: &str) -> Option<u64> {
    let camera = camera_stem(stem);
    let digit_count = camera
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digit_count == 0 {
        return None;
    }
    camera[camera.len() - digit_count..].parse().ok()
}

/// Build the marked filename for a stack output.
///
/// `IMG_0105` + `.JPG` + prefix `focus` becomes `IMG_0105 focus stacked.JPG`.
/// The prefix is trimmed and runs of whitespace collapse to one space.
pub fn stacked_file_name(stem: &str, ext: &str, prefix: Option<&str>) -> String {
    let mut parts = vec![stem];
    if let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(prefix);
    }
    parts.push(STACKED_MARKER);
    let joined = parts.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if ext.is_empty() {
        collapsed
    } else {
        format!("{}.{}", collapsed, ext)
    }
}
