//! Command-line parsing for the gain-vs-voltage fitter.
//!
//! The only input is the channel-group identifier; it names the measurement
//! table and prefixes every output file.

use clap::Parser;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "gainvoltage",
    version,
    about = "Fit PMT gain versus voltage with a power law, per channel"
)]
pub struct Cli {
    /// Channel group, e.g. `CH03`. Reads `<GROUP>.txt` (PMT# Voltage Gain GainError).
    #[arg(value_name = "GROUP")]
    pub group: String,
}
