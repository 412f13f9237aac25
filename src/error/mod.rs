//! # Error Module
//!
//! Error types for stack detection and file transfer.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Fatal vs. per-file** - scan and config errors end the run, transfer
//!   errors are collected and counted

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum StackCopyError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that occur while cataloguing the source directory
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while moving or copying a single file
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("'{destination}' already exists with different content. Use --force to overwrite.")]
    Collision { source_path: PathBuf, destination: PathBuf },

    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rename of {path} failed and the copy fallback failed too: {source}")]
    CrossDeviceFallback {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy verification failed for {path}: source {expected} bytes, destination {actual} bytes")]
    VerificationFailed {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("No free disambiguated name for {path}")]
    NoFreeName { path: PathBuf },
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this failure is a destination collision rather than an I/O fault
    pub fn is_collision(&self) -> bool {
        matches!(self, TransferError::Collision { .. })
    }
}

/// Invalid run configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Source directory '{path}' does not exist or is not a directory")]
    SourceNotDirectory { path: PathBuf },

    #[error("Source and destination directories cannot be the same: {path}")]
    SameSourceAndDestination { path: PathBuf },

    #[error("Date filters cannot be used with the rename mode")]
    DateFilterWithRename,

    #[error("Lightroom import mode needs a Lightroom root directory (--lightroom-root)")]
    MissingLightroomRoot,

    #[error("Job count must be at least 1")]
    ZeroJobs,

    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, StackCopyError>;
