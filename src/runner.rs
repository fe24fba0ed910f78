//! Task orchestration.
//!
//! ## Flow per task
//!
//! ```text
//! collect_task_files ─┬─ unsupported ──────────────────────────┐
//!                     └─ supported ─> feeder ─> [job channel]   │
//!                                        │                      v
//!                           extract-0..N workers ─> [result channel] ─> Aggregator (this thread)
//!                                                                          │
//!                                                      write_task_reports <┘
//! ```
//!
//! Tasks run one after another. Inside a task, extraction runs on a bounded
//! pool of scoped threads while the calling thread is the only one touching
//! the [`Aggregator`]. The first failure stops the feeder and the workers and
//! fails the task; the run stops there and no reports are written for it.

use crate::aggregate::{Aggregation, Aggregator, ExtractedFile, ExtractionOutcome};
use crate::config::{AppConfig, TaskConfig};
use crate::error::{AnalyzerError, Result};
use crate::extractor::SchemaExtractor;
use crate::progress::{NoProgress, ProgressObserver};
use crate::report::{self, ReportPaths};
use crate::scan;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

static NO_PROGRESS: NoProgress = NoProgress;

/// Outcome of one successful task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub task: String,
    pub tables: usize,
    pub skipped: usize,
    pub indexes: usize,
    pub reports: ReportPaths,
}

/// Extract schema and metadata for one supported file.
pub fn extract_file(extractor: &dyn SchemaExtractor, path: &Path) -> ExtractionOutcome {
    let schema = extractor
        .extract(path)
        .map_err(|e| AnalyzerError::extraction_failed(path, &e))?;
    let meta = scan::file_meta(path)?;
    Ok(ExtractedFile { meta, schema })
}

pub struct TaskRunner<'a> {
    extractor: &'a dyn SchemaExtractor,
    progress: &'a dyn ProgressObserver,
    workers: usize,
}

impl<'a> TaskRunner<'a> {
    pub fn new(extractor: &'a dyn SchemaExtractor) -> Self {
        Self {
            extractor,
            progress: &NO_PROGRESS,
            workers: 1,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressObserver) -> Self {
        self.progress = progress;
        self
    }

    /// Number of extraction threads per task (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run every configured task in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first task's error unchanged; later tasks are not started.
    pub fn run_all(&self, config: &AppConfig) -> Result<Vec<TaskSummary>> {
        config.validate()?;

        let mut summaries = Vec::with_capacity(config.tasks.len());
        for task in &config.tasks {
            summaries.push(self.run_task(task, &config.output_dir)?);
        }
        Ok(summaries)
    }

    /// Scan, extract, aggregate and write the two reports for one task.
    ///
    /// The progress observer hears `on_task_finish` on success and
    /// `on_task_abort` on failure.
    pub fn run_task(&self, task: &TaskConfig, output_root: &Path) -> Result<TaskSummary> {
        tracing::info!("Running task: {task}");

        match self.process_task(task, output_root) {
            Ok(summary) => {
                self.progress.on_task_finish(&task.name);
                Ok(summary)
            }
            Err(e) => {
                self.progress.on_task_abort(&task.name);
                Err(e)
            }
        }
    }

    fn process_task(&self, task: &TaskConfig, output_root: &Path) -> Result<TaskSummary> {
        let aggregation = self.aggregate_task(task)?;
        let task_dir = output_root.join(&task.name);
        let reports = report::write_task_reports(&task_dir, &aggregation)?;

        let vocabulary = aggregation.vocabulary();
        tracing::info!(
            "Task {}: {} table(s), {} skipped, found {} unique indexes across all tables",
            task.name,
            aggregation.records().len(),
            aggregation.skipped(),
            vocabulary.len()
        );
        if !vocabulary.is_empty() {
            tracing::debug!("Index usage for {}: {}", task.name, vocabulary.usage_summary());
        }

        Ok(TaskSummary {
            task: task.name.clone(),
            tables: aggregation.records().len(),
            skipped: aggregation.skipped(),
            indexes: vocabulary.len(),
            reports,
        })
    }

    /// Everything up to, but not including, writing reports.
    pub fn aggregate_task(&self, task: &TaskConfig) -> Result<Aggregation> {
        let paths = scan::collect_task_files(task)?;
        self.progress.on_task_start(&task.name, paths.len() as u64);

        let (supported, unsupported): (Vec<PathBuf>, Vec<PathBuf>) =
            paths.into_iter().partition(|p| scan::is_supported(p));

        let mut aggregator = Aggregator::new();
        for path in &unsupported {
            aggregator.skip(path);
            self.progress.on_file(path);
        }
        self.extract_all(supported, &mut aggregator)?;

        Ok(aggregator.finish())
    }

    fn extract_all(&self, paths: Vec<PathBuf>, aggregator: &mut Aggregator) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let workers = self.workers.clamp(1, paths.len());
        let extractor = self.extractor;
        let progress = self.progress;
        let stop = AtomicBool::new(false);

        std::thread::scope(|scope| -> Result<()> {
            let (job_tx, job_rx) = crossbeam_channel::bounded::<PathBuf>(workers * 2);
            let (result_tx, result_rx) =
                crossbeam_channel::unbounded::<(PathBuf, ExtractionOutcome)>();

            for id in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let stop = &stop;
                std::thread::Builder::new()
                    .name(format!("extract-{id}"))
                    .spawn_scoped(scope, move || {
                        for path in job_rx {
                            if stop.load(Ordering::Relaxed) {
                                break;
                            }
                            let outcome = extract_file(extractor, &path);
                            if result_tx.send((path, outcome)).is_err() {
                                break;
                            }
                        }
                    })?;
            }
            // Workers hold the only remaining ends; the loop below ends when they do
            drop(job_rx);
            drop(result_tx);

            let feeder_stop = &stop;
            scope.spawn(move || {
                for path in paths {
                    if feeder_stop.load(Ordering::Relaxed) || job_tx.send(path).is_err() {
                        break;
                    }
                }
            });

            for (path, outcome) in result_rx {
                progress.on_file(&path);
                if let Err(e) = aggregator.accept(&path, outcome) {
                    stop.store(true, Ordering::Relaxed);
                    tracing::warn!("Aborting task after failure: {e}");
                    return Err(e);
                }
            }
            Ok(())
        })
    }
}
