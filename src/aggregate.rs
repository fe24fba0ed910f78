//! Aggregation of per-file extraction results into report-ready structures.
//!
//! One [`Aggregator`] owns everything for one task:
//!
//! ```text
//! (path, ExtractionOutcome) ──accept──> Aggregator ──finish──> Aggregation
//!                                         │                     ├─ records     (name, path order)
//!                                         │                     ├─ vocabulary  (sorted, unique)
//!                                         └─ first Err aborts   └─ membership  (path order)
//! ```
//!
//! All orderings are ordinal (byte-wise, case-sensitive) comparisons, so the
//! result depends only on the *set* of inputs, never on the order in which
//! worker threads deliver them. Paths are compared as raw OS strings: two file
//! names that only differ in non-UTF-8 bytes stay two tables, even though they
//! render alike.

use crate::error::Result;
use crate::extractor::TableSchema;
use crate::scan::{self, FileMeta};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// What extraction produced for one supported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub meta: FileMeta,
    pub schema: TableSchema,
}

/// Extraction result for one path; an `Err` is fatal to the task.
pub type ExtractionOutcome = Result<ExtractedFile>;

/// One successfully processed table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub index_names: BTreeSet<String>,
    pub col_keys: BTreeSet<String>,
}

impl TableRecord {
    pub fn new(path: &Path, file: ExtractedFile) -> Self {
        Self {
            name: scan::table_name(path),
            path: path.to_path_buf(),
            size_bytes: file.meta.size_bytes,
            modified_at: file.meta.modified_at,
            index_names: file.schema.indexes.into_iter().collect(),
            col_keys: file.schema.col_keys.into_iter().collect(),
        }
    }

    /// Path as written into reports.
    pub fn path_text(&self) -> Cow<'_, str> {
        self.path.to_string_lossy()
    }

    fn inventory_key(&self) -> (&str, &OsStr) {
        (&self.name, self.path.as_os_str())
    }
}

/// Every distinct index name seen in a task, in ordinal order, with the number
/// of tables declaring it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexVocabulary {
    counts: BTreeMap<String, usize>,
}

impl IndexVocabulary {
    fn observe(&mut self, index: &str) {
        *self.counts.entry(index.to_owned()).or_default() += 1;
    }

    /// Index names, sorted ascending, no duplicates.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.counts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn contains(&self, index: &str) -> bool {
        self.counts.contains_key(index)
    }

    /// How many tables declare `index` (0 if unknown).
    pub fn table_count(&self, index: &str) -> usize {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// `name=tables` for every index, in vocabulary order.
    pub fn usage_summary(&self) -> String {
        self.names()
            .map(|index| format!("{index}={}", self.table_count(index)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Table path → indexes present in that table. Absent pairs are `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipMatrix {
    rows: BTreeMap<OsString, BTreeSet<String>>,
}

impl MembershipMatrix {
    pub fn contains<P: AsRef<Path>>(&self, path: P, index: &str) -> bool {
        self.rows
            .get(path.as_ref().as_os_str())
            .is_some_and(|indexes| indexes.contains(index))
    }

    /// Row paths in ascending ordinal order.
    pub fn paths(&self) -> impl ExactSizeIterator<Item = &Path> + '_ {
        self.rows.keys().map(Path::new)
    }

    /// Membership of `path` for every vocabulary entry, in vocabulary order.
    pub fn row<P: AsRef<Path>>(&self, path: P, vocabulary: &IndexVocabulary) -> Vec<bool> {
        let path = path.as_ref();
        vocabulary
            .names()
            .map(|index| self.contains(path, index))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Single owner of a task's accumulating state.
///
/// Not shared between threads: workers send outcomes, one thread accepts them.
#[derive(Debug, Default)]
pub struct Aggregator {
    tables: BTreeMap<OsString, TableRecord>,
    vocabulary: IndexVocabulary,
    membership: MembershipMatrix,
    skipped: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one extraction outcome in.
    ///
    /// Returns `Ok(true)` when a table was recorded and `Ok(false)` when the
    /// path was skipped (unsupported extension, or already recorded).
    ///
    /// # Errors
    ///
    /// A failed outcome for a supported file is returned unchanged; the caller
    /// must abandon the task.
    pub fn accept(&mut self, path: &Path, outcome: ExtractionOutcome) -> Result<bool> {
        if !scan::is_supported(path) {
            self.skip(path);
            return Ok(false);
        }
        let file = outcome?;
        Ok(self.add(TableRecord::new(path, file)))
    }

    /// Exclude a file with an unsupported extension. Not an error.
    pub fn skip(&mut self, path: &Path) {
        tracing::info!(
            "Skipping file with unsupported extension: {} (supported: {})",
            path.display(),
            scan::SUPPORTED_EXTENSIONS.join(", ")
        );
        self.skipped += 1;
    }

    /// Record a table. A second record for the same path is ignored.
    pub fn add(&mut self, record: TableRecord) -> bool {
        let key = record.path.as_os_str().to_owned();
        if self.tables.contains_key(&key) {
            tracing::warn!("Table {} seen twice, keeping the first", record.path.display());
            return false;
        }

        for index in &record.index_names {
            self.vocabulary.observe(index);
        }
        self.membership
            .rows
            .insert(key.clone(), record.index_names.clone());
        tracing::debug!(
            "Recorded {} ({} index(es), {} column key(s))",
            record.path.display(),
            record.index_names.len(),
            record.col_keys.len()
        );
        self.tables.insert(key, record);
        true
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn finish(self) -> Aggregation {
        let mut records: Vec<TableRecord> = self.tables.into_values().collect();
        records.sort_by(|a, b| a.inventory_key().cmp(&b.inventory_key()));
        Aggregation {
            records,
            vocabulary: self.vocabulary,
            membership: self.membership,
            skipped: self.skipped,
        }
    }
}

/// Final, immutable result for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    records: Vec<TableRecord>,
    vocabulary: IndexVocabulary,
    membership: MembershipMatrix,
    skipped: usize,
}

impl Aggregation {
    /// Table records ordered by name, ties broken by path.
    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }

    pub fn vocabulary(&self) -> &IndexVocabulary {
        &self.vocabulary
    }

    pub fn membership(&self) -> &MembershipMatrix {
        &self.membership
    }

    /// Files excluded for their extension.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Row order of the pivot report: paths ascending.
    pub fn pivot_order(&self) -> Vec<&Path> {
        self.membership.paths().collect()
    }
}

/// Fold a whole sequence of outcomes, stopping at the first failure.
pub fn aggregate<I>(outcomes: I) -> Result<Aggregation>
where
    I: IntoIterator<Item = (PathBuf, ExtractionOutcome)>,
{
    let mut aggregator = Aggregator::new();
    for (path, outcome) in outcomes {
        aggregator.accept(&path, outcome)?;
    }
    Ok(aggregator.finish())
}
