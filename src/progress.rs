//! Progress reporting.
//!
//! Purely informational: the runner calls the observer as files are processed,
//! and nothing it does can influence the run.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;

/// Receives progress notifications from the task runner.
///
/// All methods default to no-ops.
pub trait ProgressObserver: Send + Sync {
    /// A task is about to process `total` enumerated files.
    fn on_task_start(&self, _task: &str, _total: u64) {}

    /// One enumerated file has been handled (recorded or skipped).
    fn on_file(&self, _path: &Path) {}

    /// The task finished successfully.
    fn on_task_finish(&self, _task: &str) {}

    /// The task failed; no reports were written for it.
    fn on_task_abort(&self, _task: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Terminal progress bar, one per task.
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

const BAR_TEMPLATE: &str = "{msg} [{bar:50.cyan/blue}] {pos}/{len} ({per_sec})";

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_task_start(&self, task: &str, total: u64) {
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(format!("Processing files ({task})"));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_file(&self, _path: &Path) {
        if let Some(bar) = self.current() {
            bar.inc(1);
        }
    }

    fn on_task_finish(&self, task: &str) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_with_message(format!("Done ({task})"));
        }
    }

    fn on_task_abort(&self, task: &str) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.abandon_with_message(format!("Failed ({task})"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_progress_lifecycle() {
        let progress = ConsoleProgress::new();
        // no bar yet: must not panic
        progress.on_file(Path::new("a.csv"));

        progress.on_task_start("t", 2);
        progress.on_file(Path::new("a.csv"));
        progress.on_file(Path::new("b.csv"));
        assert_eq!(progress.current().map(|b| b.position()), Some(2));

        progress.on_task_finish("t");
        assert!(progress.current().is_none());
    }

    #[test]
    fn test_console_progress_abort_releases_bar() {
        let progress = ConsoleProgress::new();
        progress.on_task_start("t", 3);
        progress.on_file(Path::new("a.csv"));
        progress.on_task_abort("t");
        assert!(progress.current().is_none());

        // the next task starts a fresh bar
        progress.on_task_start("u", 1);
        assert_eq!(progress.current().map(|b| b.position()), Some(0));
        // abort without a bar must not panic
        progress.on_task_finish("u");
        progress.on_task_abort("u");
    }

    #[test]
    fn test_no_progress_is_inert() {
        let progress = NoProgress;
        progress.on_task_start("t", 1);
        progress.on_file(Path::new("x"));
        progress.on_task_finish("t");
        progress.on_task_abort("t");
    }
}
