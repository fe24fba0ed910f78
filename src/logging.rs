//! Logging setup for tbl-analyzer
//!
//! Console output goes to stderr so it never mixes with report paths printed on
//! stdout. Two daily-rotated files are written alongside:
//!
//! - `tbl-analyzer.<date>.log`: everything passing the env filter
//! - `error.<date>.log`: warnings and errors only
//!
//! ## Usage
//!
//! ```no_run
//! use tbl_analyzer::logging;
//!
//! // Initialize once at startup; `None` picks the platform data directory
//! logging::init(None).expect("Failed to initialize logging");
//!
//! tracing::info!("Run started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const APP_DIR: &str = "tbl-analyzer";
const MAX_LOG_FILES: usize = 10;

/// Gets the default log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/tbl-analyzer/logs`
/// - macOS: `~/Library/Application Support/tbl-analyzer/logs`
/// - Linux: `~/.local/share/tbl-analyzer/logs`
///
/// # Errors
///
/// Returns error if the platform has no data directory.
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join(APP_DIR).join("logs"))
}

fn ensure_dir(log_dir: &Path) -> Result<()> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(())
}

fn appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} file appender"))
}

/// Initializes console and file logging.
///
/// `log_dir` overrides the platform default from [`get_log_dir`].
/// The level defaults to INFO and can be overridden with `RUST_LOG`.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or an appender fails.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let all_logs_appender = appender(&log_dir, APP_DIR)?;
    let error_logs_appender = appender(&log_dir, "error")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Logging was already initialized")?;

    tracing::debug!("Logging initialized, log directory: {}", log_dir.display());

    Ok(())
}

/// Path of today's main log file inside `log_dir`.
pub fn current_log_path(log_dir: &Path) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d");
    log_dir.join(format!("{APP_DIR}.{today}.log"))
}
