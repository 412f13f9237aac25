//! Types for the transfer engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Copy keeps the source, move removes it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

/// What part of the shoot a file belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A frame that fed a stack
    Input,
    /// The composed stack JPEG
    Output,
    /// Anything else moved in Lightroom import mode
    Remaining,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Input => write!(f, "input"),
            Category::Output => write!(f, "output"),
            Category::Remaining => write!(f, "remaining"),
        }
    }
}

/// One planned relocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferOp {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: TransferMode,
    pub category: Category,
    /// Lowercase stem of the source; outcomes are tallied per stem
    pub stem: String,
}

impl TransferOp {
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What the engine did (or would do, in a dry run)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    /// Destination was absent and now holds the file
    Transferred,
    /// Destination already held identical bytes; nothing written
    Deduplicated,
    /// Destination was a zero-byte leftover and was replaced
    Healed,
    /// Destination held different bytes and `force` replaced them
    Overwritten,
}

/// Result of a successful operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferOutcome {
    pub action: TransferAction,
    pub dry_run: bool,
}
