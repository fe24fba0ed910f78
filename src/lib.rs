//! # tbl-analyzer - Table Index Analysis
//!
//! Scans directories of table files (`.fac`, `.txt`, `.csv`), extracts the
//! indexes and column keys each file declares, and writes two reports per
//! task:
//!
//! - `table_info.csv`: one row per table with path, modification time, size,
//!   name, indexes and column keys
//! - `table_index_analysis.csv`: a table × index membership matrix of `1`/`0`
//!
//! ## Quick Start
//!
//! ```no_run
//! use tbl_analyzer::config::AppConfig;
//! use tbl_analyzer::extractor::DirectiveExtractor;
//! use tbl_analyzer::runner::TaskRunner;
//! use std::path::Path;
//!
//! # fn example() -> tbl_analyzer::error::Result<()> {
//! let config = AppConfig::load(Path::new("inputs/config.yaml"))?;
//! let summaries = TaskRunner::new(&DirectiveExtractor).run_all(&config)?;
//! for summary in summaries {
//!     println!("{}: {} tables", summary.task, summary.tables);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`config`]: YAML run configuration and validation
//! - [`scan`]: Directory enumeration and file metadata
//! - [`extractor`]: The [`extractor::SchemaExtractor`] seam and the bundled
//!   directive reader
//! - [`aggregate`]: Table records, index vocabulary and membership matrix
//! - [`report`]: CSV serialization of both reports
//! - [`runner`]: Per-task orchestration over a worker pool
//! - [`progress`]: Progress observers
//! - [`error`]: Error types and handling utilities
//! - [`logging`]: Console and rolling-file log setup
//!
//! ## Determinism
//!
//! Reports are a pure function of the files on disk: the number of workers
//! and the order in which extractions complete never change a byte of output.

#![warn(clippy::all, rust_2018_idioms)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod progress;
pub mod report;
pub mod runner;
pub mod scan;
