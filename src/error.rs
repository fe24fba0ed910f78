//! Centralized error handling for tbl-analyzer.
//!
//! Every failure the analyzer can hit is fatal to the task being processed and,
//! through the runner, to the whole run. The enum below keeps the kinds apart so
//! callers (and tests) can tell *which* stage failed and for *which* path.
//!
//! ## Custom Error Types with `enum`
//!
//! ```
//! use tbl_analyzer::error::AnalyzerError;
//!
//! fn describe(err: &AnalyzerError) -> &'static str {
//!     match err {
//!         AnalyzerError::ExtractionFailed { .. } => "parser rejected a table file",
//!         AnalyzerError::MetadataUnavailable { .. } => "could not stat a table file",
//!         AnalyzerError::ConfigInvalid(_) => "bad configuration",
//!         _ => "other failure",
//!     }
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// Main error type for analyzer operations.
#[derive(Debug)]
pub enum AnalyzerError {
    /// Configuration could not be parsed or failed validation
    ConfigInvalid(String),

    /// A configured source directory could not be listed
    DirectoryUnreadable { path: PathBuf, cause: String },

    /// The schema extractor rejected a table file
    ExtractionFailed { path: PathBuf, cause: String },

    /// Size or modification time of a table file could not be read
    MetadataUnavailable { path: PathBuf, cause: String },

    /// The per-task output directory could not be created
    OutputDirCreateFailed { path: PathBuf, cause: String },

    /// A report file could not be created, written or moved into place
    OutputWriteFailed { path: PathBuf, cause: String },

    /// Raw I/O errors not tied to a specific stage
    Io(std::io::Error),
}

impl AnalyzerError {
    pub fn directory_unreadable(path: &Path, cause: impl fmt::Display) -> Self {
        Self::DirectoryUnreadable {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        }
    }

    pub fn extraction_failed(path: &Path, cause: &anyhow::Error) -> Self {
        Self::ExtractionFailed {
            path: path.to_path_buf(),
            // `{:#}` keeps the whole cause chain on one line
            cause: format!("{cause:#}"),
        }
    }

    pub fn metadata_unavailable(path: &Path, cause: impl fmt::Display) -> Self {
        Self::MetadataUnavailable {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        }
    }

    pub fn output_dir_create_failed(path: &Path, cause: impl fmt::Display) -> Self {
        Self::OutputDirCreateFailed {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        }
    }

    pub fn output_write_failed(path: &Path, cause: impl fmt::Display) -> Self {
        Self::OutputWriteFailed {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        }
    }

    /// Path the error is about, when the kind carries one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::DirectoryUnreadable { path, .. }
            | Self::ExtractionFailed { path, .. }
            | Self::MetadataUnavailable { path, .. }
            | Self::OutputDirCreateFailed { path, .. }
            | Self::OutputWriteFailed { path, .. } => Some(path),
            Self::ConfigInvalid(_) | Self::Io(_) => None,
        }
    }
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::DirectoryUnreadable { path, cause } => {
                write!(f, "Cannot read directory {}: {cause}", path.display())
            }
            Self::ExtractionFailed { path, cause } => {
                write!(f, "Failed to extract schema from {}: {cause}", path.display())
            }
            Self::MetadataUnavailable { path, cause } => {
                write!(f, "Failed to read file metadata for {}: {cause}", path.display())
            }
            Self::OutputDirCreateFailed { path, cause } => {
                write!(
                    f,
                    "Failed to create output directory {}: {cause}",
                    path.display()
                )
            }
            Self::OutputWriteFailed { path, cause } => {
                write!(f, "Failed to write report {}: {cause}", path.display())
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for AnalyzerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnalyzerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yaml::Error> for AnalyzerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigInvalid(format!("YAML error: {err}"))
    }
}

/// Result type alias for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_path_and_cause() {
        let err = AnalyzerError::ExtractionFailed {
            path: PathBuf::from("/data/a.fac"),
            cause: "bad header".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to extract schema from /data/a.fac: bad header"
        );
    }

    #[test]
    fn test_extraction_failed_keeps_cause_chain() {
        let cause = anyhow::anyhow!("line 3").context("invalid directive");
        let err = AnalyzerError::extraction_failed(Path::new("t.csv"), &cause);
        let msg = err.to_string();
        assert!(msg.contains("invalid directive"));
        assert!(msg.contains("line 3"));
    }

    #[test]
    fn test_error_path_accessor() {
        let err = AnalyzerError::metadata_unavailable(Path::new("x.txt"), "gone");
        assert_eq!(err.path(), Some(Path::new("x.txt")));
        assert!(AnalyzerError::ConfigInvalid("x".to_owned()).path().is_none());
    }

    #[test]
    fn test_conversions_keep_their_stage() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("[1, x]").unwrap_err();
        assert!(matches!(
            AnalyzerError::from(yaml_err),
            AnalyzerError::ConfigInvalid(_)
        ));

        let io_err = AnalyzerError::from(std::io::Error::other("boom"));
        assert!(matches!(io_err, AnalyzerError::Io(_)));
        assert!(std::error::Error::source(&io_err).is_some());
    }
}
