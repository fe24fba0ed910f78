use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tbl_analyzer::config::{AppConfig, DEFAULT_CONFIG_PATH};
use tbl_analyzer::extractor::{DirectiveExtractor, SchemaExtractor as _};
use tbl_analyzer::progress::{ConsoleProgress, NoProgress, ProgressObserver};
use tbl_analyzer::runner::TaskRunner;
use tbl_analyzer::{report, scan};

#[derive(Parser)]
#[command(
    name = "tbl-analyzer",
    version,
    about = "Index inventory and index membership reports for table files"
)]
pub struct Cli {
    /// Directory for log files. Defaults to the platform data directory.
    #[arg(long, global = true, env = "TBL_ANALYZER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured task and write its reports
    Run {
        /// Path to the YAML run configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Override the configured output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Override the number of extraction workers per task
        #[arg(short, long)]
        workers: Option<usize>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Load and validate a configuration without scanning anything
    Validate {
        /// Path to the YAML run configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Show the indexes and column keys declared by one table file
    Inspect {
        /// Table file to read
        file: PathBuf,
    },
}

impl Commands {
    /// What a bare `tbl-analyzer` invocation does.
    pub fn default_run() -> Self {
        Self::Run {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            output_dir: None,
            workers: None,
            no_progress: false,
        }
    }
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            output_dir,
            workers,
            no_progress,
        } => handle_run(&config, output_dir, workers, no_progress),
        Commands::Validate { config } => handle_validate(&config),
        Commands::Inspect { file } => handle_inspect(&file),
    }
}

fn load_config(
    path: &Path,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
) -> Result<AppConfig> {
    let mut config = AppConfig::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if workers.is_some() {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

fn handle_run(
    config_path: &Path,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
    no_progress: bool,
) -> Result<()> {
    let config = load_config(config_path, output_dir, workers)?;

    let console = ConsoleProgress::new();
    let progress: &dyn ProgressObserver = if no_progress { &NoProgress } else { &console };

    let summaries = TaskRunner::new(&DirectiveExtractor)
        .with_progress(progress)
        .with_workers(config.effective_workers())
        .run_all(&config)?;

    for summary in &summaries {
        println!(
            "{}: {} table(s), {} index(es), {} skipped",
            summary.task, summary.tables, summary.indexes, summary.skipped
        );
        println!("  {}", summary.reports.inventory.display());
        println!("  {}", summary.reports.pivot.display());
    }
    Ok(())
}

fn handle_validate(config_path: &Path) -> Result<()> {
    let config = load_config(config_path, None, None)?;

    println!("Output directory: {}", config.output_dir.display());
    println!("Workers per task: {}", config.effective_workers());
    for task in &config.tasks {
        println!("  {task}");
    }
    Ok(())
}

fn handle_inspect(file: &Path) -> Result<()> {
    if !scan::is_supported(file) {
        tracing::warn!(
            "{} does not have a supported extension and would be skipped by a run",
            file.display()
        );
    }

    let schema = DirectiveExtractor
        .extract(file)
        .with_context(|| format!("Failed to inspect {}", file.display()))?;
    let meta = scan::file_meta(file)?;

    println!("Table:    {}", scan::table_name(file));
    println!("Size (M): {}", report::format_size_mb(meta.size_bytes));
    println!("Indexes:  {}", schema.indexes.join(report::LIST_SEPARATOR));
    println!("ColKeys:  {}", schema.col_keys.join(report::LIST_SEPARATOR));
    Ok(())
}
