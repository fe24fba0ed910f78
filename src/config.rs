//! Run configuration.
//!
//! A run is a list of tasks sharing one output root:
//!
//! ```yaml
//! output_dir: outputs
//! workers: 4
//! tasks:
//!   - name: daily
//!     dirs: [/data/daily, /data/extra]
//!     recursive: true
//! ```

use crate::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Config file used when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "inputs/config.yaml";

/// One scan-and-report unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name, also the name of its output sub-directory
    pub name: String,
    /// Source directories, scanned in order
    pub dirs: Vec<PathBuf>,
    /// Descend into sub-directories
    #[serde(default, alias = "if_recursive")]
    pub recursive: bool,
}

impl std::fmt::Display for TaskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dirs: Vec<String> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        write!(
            f,
            "{} [{}] (recursive: {})",
            self.name,
            dirs.join(", "),
            self.recursive
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root under which `<task name>/` report directories are created
    pub output_dir: PathBuf,
    /// Extraction worker threads per task; `None` means available parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    pub tasks: Vec<TaskConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// Parsing only; call [`AppConfig::validate`] before running.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::ConfigInvalid(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Check everything the runner relies on.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::ConfigInvalid`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(invalid("output_dir must not be empty"));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1"));
        }
        if self.tasks.is_empty() {
            return Err(invalid("no tasks configured"));
        }

        let mut seen = HashSet::new();
        for (i, task) in self.tasks.iter().enumerate() {
            if task.name.trim().is_empty() {
                return Err(invalid(format!("task #{} has an empty name", i + 1)));
            }
            if !is_single_component(&task.name) {
                return Err(invalid(format!(
                    "task name '{}' must be a plain directory name",
                    task.name
                )));
            }
            if !seen.insert(task.name.as_str()) {
                return Err(invalid(format!("duplicate task name '{}'", task.name)));
            }
            if task.dirs.is_empty() {
                return Err(invalid(format!("task '{}' has no dirs", task.name)));
            }
            if task.dirs.iter().any(|d| d.as_os_str().is_empty()) {
                return Err(invalid(format!(
                    "task '{}' has an empty directory entry",
                    task.name
                )));
            }
        }
        Ok(())
    }

    /// Number of extraction workers to use for each task.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

fn invalid(msg: impl Into<String>) -> AnalyzerError {
    AnalyzerError::ConfigInvalid(msg.into())
}

fn is_single_component(name: &str) -> bool {
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
