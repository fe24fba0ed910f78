//! Report serialization.
//!
//! Two delimited files per task, both fully determined by the [`Aggregation`]:
//!
//! - `table_info.csv`: one row per table, ordered by table name then path
//! - `table_index_analysis.csv`: table × index pivot with `1`/`0` cells,
//!   ordered by path, one column per vocabulary entry
//!
//! Files are rendered into `<name>.tmp` siblings first and renamed into place
//! only once both renders succeeded, so a failing task never leaves a half-written
//! report behind or a mismatched pair on disk.

use crate::aggregate::{Aggregation, IndexVocabulary, MembershipMatrix, TableRecord};
use crate::error::{AnalyzerError, Result};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const INVENTORY_FILE: &str = "table_info.csv";
pub const PIVOT_FILE: &str = "table_index_analysis.csv";

pub const INVENTORY_HEADER: [&str; 6] = [
    "Table Path",
    "Modified at",
    "Table Size (in M)",
    "Table Name",
    "Indexes",
    "ColKeys",
];
pub const PIVOT_PATH_HEADER: &str = "Table Path";

/// Separator for multi-valued cells (indexes, column keys).
pub const LIST_SEPARATOR: &str = ";";

/// `Modified at` rendering, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Size in megabytes with exactly two decimals.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB)
}

fn join_sorted(values: &BTreeSet<String>) -> String {
    // BTreeSet iteration is already ordinal and duplicate-free
    values
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn inventory_row(record: &TableRecord) -> [String; 6] {
    [
        record.path_text().into_owned(),
        record
            .modified_at
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        format_size_mb(record.size_bytes),
        record.name.clone(),
        join_sorted(&record.index_names),
        join_sorted(&record.col_keys),
    ]
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

/// Render the inventory report into any sink.
pub fn render_inventory<W: Write>(out: W, records: &[TableRecord]) -> csv::Result<()> {
    let mut writer = csv_writer(out);
    writer.write_record(INVENTORY_HEADER)?;
    for record in records {
        writer.write_record(inventory_row(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the pivot report into any sink.
///
/// `row_order` lists the table paths to emit, in order. A path unknown to
/// `matrix` renders as all zeros.
pub fn render_pivot<W: Write>(
    out: W,
    vocabulary: &IndexVocabulary,
    matrix: &MembershipMatrix,
    row_order: &[&Path],
) -> csv::Result<()> {
    let mut writer = csv_writer(out);

    let mut header = Vec::with_capacity(vocabulary.len() + 1);
    header.push(PIVOT_PATH_HEADER);
    header.extend(vocabulary.names());
    writer.write_record(&header)?;

    for path in row_order {
        let text = path.to_string_lossy();
        let mut row = Vec::with_capacity(vocabulary.len() + 1);
        row.push(&*text);
        row.extend(
            vocabulary
                .names()
                .map(|index| if matrix.contains(path, index) { "1" } else { "0" }),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// A report rendered to a temporary sibling, waiting to be moved into place.
///
/// Dropping it without [`StagedFile::commit`] removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Render into `<dest>.tmp` through `render`.
    pub fn stage<F>(dest: &Path, render: F) -> Result<Self>
    where
        F: FnOnce(&mut BufWriter<File>) -> csv::Result<()>,
    {
        let mut tmp_name = dest.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let staged = Self {
            tmp: PathBuf::from(tmp_name),
            dest: dest.to_path_buf(),
            committed: false,
        };

        let file = File::create(&staged.tmp)
            .map_err(|e| AnalyzerError::output_write_failed(dest, e))?;
        let mut out = BufWriter::new(file);
        render(&mut out).map_err(|e| AnalyzerError::output_write_failed(dest, e))?;
        out.flush()
            .map_err(|e| AnalyzerError::output_write_failed(dest, e))?;
        Ok(staged)
    }

    /// Atomically replace the destination with the staged file.
    pub fn commit(mut self) -> Result<PathBuf> {
        fs::rename(&self.tmp, &self.dest)
            .map_err(|e| AnalyzerError::output_write_failed(&self.dest, e))?;
        self.committed = true;
        Ok(self.dest.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            fs::remove_file(&self.tmp).ok();
        }
    }
}

/// Write `table_info.csv`-style inventory to `path`.
pub fn write_inventory(path: &Path, records: &[TableRecord]) -> Result<()> {
    StagedFile::stage(path, |out| render_inventory(out, records))?.commit()?;
    Ok(())
}

/// Write `table_index_analysis.csv`-style pivot to `path`.
pub fn write_pivot(
    path: &Path,
    vocabulary: &IndexVocabulary,
    matrix: &MembershipMatrix,
    row_order: &[&Path],
) -> Result<()> {
    StagedFile::stage(path, |out| render_pivot(out, vocabulary, matrix, row_order))?.commit()?;
    Ok(())
}

/// Final locations of a task's two reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub inventory: PathBuf,
    pub pivot: PathBuf,
}

/// The previous contents of a report, moved aside while a new pair lands.
struct Backup {
    dest: PathBuf,
    saved: Option<PathBuf>,
}

impl Backup {
    fn take(dest: &Path) -> Result<Self> {
        let mut saved = None;
        if dest.is_file() {
            let mut bak_name = dest.as_os_str().to_owned();
            bak_name.push(".bak");
            let bak = PathBuf::from(bak_name);
            fs::rename(dest, &bak).map_err(|e| AnalyzerError::output_write_failed(dest, e))?;
            saved = Some(bak);
        }
        Ok(Self {
            dest: dest.to_path_buf(),
            saved,
        })
    }

    /// Put the previous file back, or remove a new one that had no predecessor.
    fn restore(self) {
        let restored = match &self.saved {
            Some(bak) => fs::rename(bak, &self.dest),
            None if self.dest.is_file() => fs::remove_file(&self.dest),
            None => Ok(()),
        };
        if let Err(e) = restored {
            tracing::warn!("Could not roll back {}: {e}", self.dest.display());
        }
    }

    fn discard(self) {
        if let Some(bak) = &self.saved {
            fs::remove_file(bak).ok();
        }
    }
}

/// Create `task_dir` and write both reports for `aggregation` into it.
///
/// Both files are staged before either is committed. If the pivot cannot be
/// moved into place, the inventory is rolled back so the directory never holds
/// a new inventory next to an old pivot.
pub fn write_task_reports(task_dir: &Path, aggregation: &Aggregation) -> Result<ReportPaths> {
    fs::create_dir_all(task_dir)
        .map_err(|e| AnalyzerError::output_dir_create_failed(task_dir, e))?;

    tracing::info!("Writing {INVENTORY_FILE}...");
    let inventory = StagedFile::stage(&task_dir.join(INVENTORY_FILE), |out| {
        render_inventory(out, aggregation.records())
    })?;

    tracing::info!("Writing {PIVOT_FILE}...");
    let row_order = aggregation.pivot_order();
    let pivot = StagedFile::stage(&task_dir.join(PIVOT_FILE), |out| {
        render_pivot(
            out,
            aggregation.vocabulary(),
            aggregation.membership(),
            &row_order,
        )
    })?;

    let backup = Backup::take(&task_dir.join(INVENTORY_FILE))?;
    let inventory = match inventory.commit() {
        Ok(path) => path,
        Err(e) => {
            backup.restore();
            return Err(e);
        }
    };
    match pivot.commit() {
        Ok(pivot) => {
            backup.discard();
            Ok(ReportPaths { inventory, pivot })
        }
        Err(e) => {
            backup.restore();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ExtractedFile, ExtractionOutcome, aggregate};
    use crate::extractor::TableSchema;
    use crate::scan::FileMeta;
    use chrono::{TimeZone as _, Utc};
    use tempfile::TempDir;

    fn table(
        path: &str,
        size: u64,
        indexes: &[&str],
        keys: &[&str],
    ) -> (PathBuf, ExtractionOutcome) {
        (
            PathBuf::from(path),
            Ok(ExtractedFile {
                meta: FileMeta {
                    size_bytes: size,
                    modified_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()),
                },
                schema: TableSchema {
                    indexes: indexes.iter().map(|s| (*s).to_owned()).collect(),
                    col_keys: keys.iter().map(|s| (*s).to_owned()).collect(),
                },
            }),
        )
    }

    fn sample() -> Aggregation {
        aggregate(vec![
            table("/d/b.txt", 0, &["Z", "Y"], &[]),
            table("/d/a.csv", 3 * 1_048_576 / 2, &["Y", "X"], &["k2", "k1"]),
        ])
        .unwrap()
    }

    fn render_to_string<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> csv::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size_mb(0), "0.00");
        assert_eq!(format_size_mb(1_048_576), "1.00");
        assert_eq!(format_size_mb(1_572_864), "1.50");
        assert_eq!(format_size_mb(10_000), "0.01");
    }

    #[test]
    fn test_render_inventory() {
        let agg = sample();
        let text = render_to_string(|out| render_inventory(out, agg.records()));
        assert_eq!(
            text,
            "Table Path,Modified at,Table Size (in M),Table Name,Indexes,ColKeys\n\
             /d/a.csv,2024-03-01 12:30:05,1.50,a.csv,X;Y,k1;k2\n\
             /d/b.txt,2024-03-01 12:30:05,0.00,b.txt,Y;Z,\n"
        );
    }

    #[test]
    fn test_render_pivot() {
        let agg = sample();
        let order = agg.pivot_order();
        let text = render_to_string(|out| {
            render_pivot(out, agg.vocabulary(), agg.membership(), &order)
        });
        assert_eq!(text, "Table Path,X,Y,Z\n/d/a.csv,1,1,0\n/d/b.txt,0,1,1\n");
    }

    #[test]
    fn test_render_pivot_without_indexes() {
        let agg = aggregate(vec![table("/d/plain.csv", 1, &[], &[])]).unwrap();
        let order = agg.pivot_order();
        let text = render_to_string(|out| {
            render_pivot(out, agg.vocabulary(), agg.membership(), &order)
        });
        assert_eq!(text, "Table Path\n/d/plain.csv\n");
    }

    #[test]
    fn test_fields_needing_quotes_are_quoted() {
        let agg = aggregate(vec![table("/d/with,comma.csv", 1, &[], &[])]).unwrap();
        let text = render_to_string(|out| render_inventory(out, agg.records()));
        assert!(text.contains("\"/d/with,comma.csv\""));
    }

    #[test]
    fn test_write_task_reports_creates_both_files() {
        let dir = TempDir::new().unwrap();
        let task_dir = dir.path().join("nested").join("task");
        let paths = write_task_reports(&task_dir, &sample()).unwrap();

        assert_eq!(paths.inventory, task_dir.join(INVENTORY_FILE));
        assert_eq!(paths.pivot, task_dir.join(PIVOT_FILE));
        let pivot = fs::read_to_string(&paths.pivot).unwrap();
        assert!(pivot.starts_with("Table Path,X,Y,Z\n"));
        // no staging leftovers
        let names: Vec<_> = fs::read_dir(&task_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_write_inventory_and_pivot_to_explicit_paths() {
        let dir = TempDir::new().unwrap();
        let agg = sample();
        let inventory = dir.path().join("inv.csv");
        let pivot = dir.path().join("piv.csv");

        write_inventory(&inventory, agg.records()).unwrap();
        write_pivot(&pivot, agg.vocabulary(), agg.membership(), &[Path::new("/d/b.txt")]).unwrap();

        let text = fs::read_to_string(&inventory).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(
            fs::read_to_string(&pivot).unwrap(),
            "Table Path,X,Y,Z\n/d/b.txt,0,1,1\n"
        );
    }

    #[test]
    fn test_write_pivot_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let agg = sample();
        let err = write_pivot(
            &dir.path().join("absent").join("piv.csv"),
            agg.vocabulary(),
            agg.membership(),
            &agg.pivot_order(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::OutputWriteFailed { .. }));
    }

    #[test]
    fn test_failed_pivot_commit_keeps_previous_pair() {
        let dir = TempDir::new().unwrap();
        write_task_reports(dir.path(), &sample()).unwrap();
        let inventory_before = fs::read(dir.path().join(INVENTORY_FILE)).unwrap();

        // a non-empty directory where the pivot goes makes its rename fail
        let pivot = dir.path().join(PIVOT_FILE);
        fs::remove_file(&pivot).unwrap();
        fs::create_dir(&pivot).unwrap();
        fs::write(pivot.join("keep"), "x").unwrap();

        let smaller = aggregate(vec![table("/d/only.fac", 1, &["Q"], &[])]).unwrap();
        let err = write_task_reports(dir.path(), &smaller).unwrap_err();
        assert!(matches!(err, AnalyzerError::OutputWriteFailed { .. }));

        assert_eq!(
            fs::read(dir.path().join(INVENTORY_FILE)).unwrap(),
            inventory_before
        );
        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![PIVOT_FILE, INVENTORY_FILE]);
    }

    #[test]
    fn test_failed_first_run_leaves_no_inventory() {
        let dir = TempDir::new().unwrap();
        let pivot = dir.path().join(PIVOT_FILE);
        fs::create_dir(&pivot).unwrap();
        fs::write(pivot.join("keep"), "x").unwrap();

        assert!(write_task_reports(dir.path(), &sample()).is_err());
        assert!(!dir.path().join(INVENTORY_FILE).exists());
    }

    #[test]
    fn test_rewrite_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        write_task_reports(dir.path(), &sample()).unwrap();
        let smaller = aggregate(vec![table("/d/only.fac", 1, &["Q"], &[])]).unwrap();
        write_task_reports(dir.path(), &smaller).unwrap();

        let pivot = fs::read_to_string(dir.path().join(PIVOT_FILE)).unwrap();
        assert_eq!(pivot, "Table Path,Q\n/d/only.fac,1\n");
    }

    #[test]
    fn test_failed_stage_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.csv");
        let err = StagedFile::stage(&dest, |_| {
            Err(csv::Error::from(std::io::Error::other("disk full")))
        })
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::OutputWriteFailed { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_output_dir_create_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = write_task_reports(&blocker.join("task"), &sample()).unwrap_err();
        assert!(matches!(err, AnalyzerError::OutputDirCreateFailed { .. }));
    }
}
