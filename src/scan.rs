//! File enumeration and file metadata.
//!
//! Thin I/O wrappers around `walkdir` and `std::fs::metadata`. Ordering of the
//! returned paths is sorted for reproducible logs, but nothing downstream
//! depends on it: the reports impose their own order.

use crate::config::TaskConfig;
use crate::error::{AnalyzerError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name suffixes the analyzer treats as table files. Case-sensitive.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".fac", ".txt", ".csv"];

/// Size and modification time of a table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

/// List regular files under `dir`.
///
/// Non-recursive scans only look at the direct children of `dir`. Symlinks are
/// not followed.
///
/// # Errors
///
/// Returns [`AnalyzerError::DirectoryUnreadable`] if `dir` (or, when recursive,
/// any directory below it) cannot be read.
pub fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnalyzerError::directory_unreadable(
            dir,
            "not an existing directory",
        ));
    }

    let mut walker = WalkDir::new(dir).min_depth(1).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(dir).to_path_buf();
            AnalyzerError::directory_unreadable(&at, e)
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// All candidate files for a task, across its directories, without duplicates.
///
/// Overlapping directories (e.g. `/data` recursive and `/data/sub`) would
/// otherwise yield the same path twice.
pub fn collect_task_files(task: &TaskConfig) -> Result<Vec<PathBuf>> {
    let mut unique = BTreeSet::new();
    for dir in &task.dirs {
        let files = list_files(dir, task.recursive)?;
        tracing::debug!("{} file(s) under {}", files.len(), dir.display());
        unique.extend(files);
    }
    Ok(unique.into_iter().collect())
}

/// Whether the file name ends with one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    let name = path.to_string_lossy();
    SUPPORTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Table name for a file: its final path component.
pub fn table_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Read size and modification time.
///
/// A platform that cannot report modification times yields `None` rather
/// than an error; a file that cannot be stat'ed at all is an error.
pub fn file_meta(path: &Path) -> Result<FileMeta> {
    let metadata =
        std::fs::metadata(path).map_err(|e| AnalyzerError::metadata_unavailable(path, e))?;
    if !metadata.is_file() {
        return Err(AnalyzerError::metadata_unavailable(
            path,
            "not a regular file",
        ));
    }
    Ok(FileMeta {
        size_bytes: metadata.len(),
        modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
    })
}
