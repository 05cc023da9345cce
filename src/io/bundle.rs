//! Read/write the aggregate plot bundle.
//!
//! The bundle is the portable, single-file collection of every fitted
//! channel's plot object:
//! - channel samples in linear and log space
//! - fit parameters and amplitude
//! - the sampled fit line and power curve
//!
//! It lets a whole channel group be inspected or re-plotted in one go.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::plot::ChannelPlot;

/// On-disk schema of the plot bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotBundle {
    pub tool: String,
    pub group: String,
    pub generated: DateTime<Local>,
    pub channels: Vec<ChannelPlot>,
    /// Channels left out because their plot holds NaN or infinite values.
    #[serde(default)]
    pub omitted: Vec<u32>,
}

impl PlotBundle {
    pub fn new(group: impl Into<String>, plots: &[ChannelPlot]) -> Self {
        let (finite, non_finite): (Vec<&ChannelPlot>, Vec<&ChannelPlot>) = plots.iter().partition(|p| p.is_finite());

        let omitted: Vec<u32> = non_finite.iter().map(|p| p.channel_id).collect();
        for id in &omitted {
            log::warn!("PMT {id} has non-finite fit or data; leaving it out of the plot bundle");
        }

        Self {
            tool: "gainvoltage".to_string(),
            group: group.into(),
            generated: Local::now(),
            channels: finite.into_iter().cloned().collect(),
            omitted,
        }
    }
}

/// Write a plot bundle as JSON.
pub fn write_plot_bundle(path: &Path, bundle: &PlotBundle) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::unwritable_output(path, e))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, bundle).map_err(|e| AppError::unwritable_output(path, e))?;
    writer.flush().map_err(|e| AppError::unwritable_output(path, e))?;

    log::info!(
        "Wrote plot bundle '{}' ({} channel(s))",
        path.display(),
        bundle.channels.len()
    );
    Ok(())
}

/// Read a plot bundle.
pub fn read_plot_bundle(path: &Path) -> Result<PlotBundle, AppError> {
    let file = File::open(path).map_err(|e| AppError::unreadable_input(path, e))?;
    serde_json::from_reader(file).map_err(|e| AppError::unreadable_input(path, format!("invalid plot bundle: {e}")))
}
