//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the group's measurement table
//! - fits every channel
//! - prints the run summary
//! - writes the fit table, plots and plot bundle

use std::path::Path;

use clap::Parser;

use crate::cli::Cli;
use crate::domain::FitConfig;
use crate::error::AppError;

pub mod pipeline;

use pipeline::GroupPaths;

/// Entry point for the `gainvoltage` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = FitConfig::new(cli.group);
    let paths = GroupPaths::new(Path::new(""), config.group.clone());

    let run = pipeline::run_fit(&config, &paths)?;

    println!(
        "{}",
        crate::report::format_run_summary(&config.group, &run.ingest, &run.fits)
    );

    pipeline::write_outputs(&run, &config, &paths)
}
