//! Run configuration and its validation.

use crate::core::detector::DetectorConfig;
use crate::error::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the input directory created under the source by default
pub const DEFAULT_INPUT_DIR: &str = "stack-inputs";

/// Subdirectory used by the stackcopy mode
pub const STACKCOPY_DIR: &str = "stacked";

/// What a run does with the source directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunMode {
    /// Copy orphan JPEGs into another directory
    Copy { destination: PathBuf },
    /// Rename orphan JPEGs in place with the `stacked` marker
    Rename,
    /// Copy orphan JPEGs into `<source>/stacked` with the marker
    StackCopy,
    /// Detect stacks, move their inputs away, mark outputs in place
    Lightroom,
    /// Lightroom mode plus moving outputs and all remaining files into the
    /// dated Lightroom tree
    LightroomImport,
}

impl RunMode {
    /// Modes that run the stack detector
    pub fn detects_stacks(&self) -> bool {
        matches!(self, RunMode::Lightroom | RunMode::LightroomImport)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Copy { .. } => write!(f, "copy"),
            RunMode::Rename => write!(f, "rename"),
            RunMode::StackCopy => write!(f, "stackcopy"),
            RunMode::Lightroom => write!(f, "lightroom"),
            RunMode::LightroomImport => write!(f, "lightroom-import"),
        }
    }
}

/// Everything a run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub source: PathBuf,
    pub mode: RunMode,
    /// Only files modified on this local date
    pub date_filter: Option<NaiveDate>,
    pub prefix: Option<String>,
    pub jobs: usize,
    pub dry_run: bool,
    pub force: bool,
    pub include_hidden: bool,
    /// Defaults to `<source>/stack-inputs`
    pub input_root: Option<PathBuf>,
    pub lightroom_root: Option<PathBuf>,
    pub detector: DetectorConfig,
}

impl RunConfig {
    pub fn new(source: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            source: source.into(),
            mode,
            date_filter: None,
            prefix: None,
            jobs: default_jobs(),
            dry_run: false,
            force: false,
            include_hidden: false,
            input_root: None,
            lightroom_root: None,
            detector: DetectorConfig::default(),
        }
    }

    /// Reject combinations that must not run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source.is_dir() {
            return Err(ConfigError::SourceNotDirectory {
                path: self.source.clone(),
            });
        }
        if self.jobs == 0 {
            return Err(ConfigError::ZeroJobs);
        }
        match &self.mode {
            RunMode::Copy { destination } if same_directory(&self.source, destination) => {
                Err(ConfigError::SameSourceAndDestination {
                    path: destination.clone(),
                })
            }
            RunMode::Rename if self.date_filter.is_some() => Err(ConfigError::DateFilterWithRename),
            RunMode::LightroomImport if self.lightroom_root.is_none() => {
                Err(ConfigError::MissingLightroomRoot)
            }
            _ => Ok(()),
        }
    }

    pub fn input_root(&self) -> PathBuf {
        self.input_root
            .clone()
            .unwrap_or_else(|| self.source.join(DEFAULT_INPUT_DIR))
    }

    /// Directory written by the simple modes
    pub fn destination_dir(&self) -> PathBuf {
        match &self.mode {
            RunMode::Copy { destination } => destination.clone(),
            RunMode::StackCopy => self.source.join(STACKCOPY_DIR),
            _ => self.source.clone(),
        }
    }
}

/// Available parallelism, but never fewer than two workers
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(2)
}

/// Compare resolved paths, falling back to the literal paths when a side
/// does not exist yet
fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid_for_existing_directory() {
        let temp = TempDir::new().unwrap();
        let config = RunConfig::new(temp.path(), RunMode::Lightroom);
        assert!(config.validate().is_ok());
        assert!(config.jobs >= 2);
        assert_eq!(config.input_root(), temp.path().join("stack-inputs"));
    }

    #[test]
    fn missing_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = RunConfig::new(temp.path().join("nope"), RunMode::Rename);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SourceNotDirectory { .. })
        ));
    }

    #[test]
    fn copy_into_itself_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = RunConfig::new(
            temp.path(),
            RunMode::Copy {
                destination: temp.path().join("."),
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SameSourceAndDestination { .. })
        ));
    }

    #[test]
    fn copy_to_new_directory_is_allowed() {
        let temp = TempDir::new().unwrap();
        let config = RunConfig::new(
            temp.path(),
            RunMode::Copy {
                destination: temp.path().join("out"),
            },
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rename_with_date_filter_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = RunConfig::new(temp.path(), RunMode::Rename);
        config.date_filter = NaiveDate::from_ymd_opt(2024, 6, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DateFilterWithRename)
        ));
    }

    #[test]
    fn import_requires_lightroom_root() {
        let temp = TempDir::new().unwrap();
        let mut config = RunConfig::new(temp.path(), RunMode::LightroomImport);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingLightroomRoot)
        ));

        config.lightroom_root = Some(temp.path().join("lr"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_jobs_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = RunConfig::new(temp.path(), RunMode::StackCopy);
        config.jobs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroJobs)));
    }

    #[test]
    fn stackcopy_writes_to_stacked_subdirectory() {
        let config = RunConfig::new("/shoot", RunMode::StackCopy);
        assert_eq!(config.destination_dir(), PathBuf::from("/shoot/stacked"));
        assert!(!config.mode.detects_stacks());
    }
}
