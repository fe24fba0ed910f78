//! # tbl-analyzer entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialize logging (console + rolling files)
//!   └─> Run the subcommand, or `run` with defaults when none is given
//! ```
//!
//! Any error is logged and the process exits with status 1.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // CLI output goes to stdout
#![expect(clippy::print_stderr)] // Fallback when logging could not start

mod cli;

use clap::Parser as _;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let log_dir = match cli.log_dir {
        Some(dir) => Some(dir),
        None => tbl_analyzer::logging::get_log_dir().ok(),
    };
    let logging_ready = match tbl_analyzer::logging::init(log_dir.as_deref()) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Warning: logging unavailable: {e:#}");
            false
        }
    };

    let command = cli.command.unwrap_or_else(cli::Commands::default_run);
    match cli::run_command(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if logging_ready {
                tracing::error!("{e:#}");
                if let Some(dir) = &log_dir {
                    tracing::error!(
                        "See {} for details",
                        tbl_analyzer::logging::current_log_path(dir).display()
                    );
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
