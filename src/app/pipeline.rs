//! The gain-vs-voltage pipeline, independent of the CLI.
//!
//! ingest -> per-channel preparation -> fit -> (after all fits) fit table,
//! SVG plots and plot bundle
//!
//! Channels are independent, so they are fitted in parallel; results are
//! collected into a channel-ordered `Vec` (index = id - 1), never appended in
//! completion order.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::data::prepare_channel;
use crate::domain::{ChannelFit, FitConfig, Measurement};
use crate::error::AppError;
use crate::fit::fit_power_law;
use crate::io::{Ingested, PlotBundle, load_measurements, write_fit_table, write_plot_bundle};
use crate::plot::{ChannelPlot, write_channel_svg};

/// Input and output locations for one channel group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPaths {
    dir: PathBuf,
    group: String,
}

impl GroupPaths {
    pub fn new(dir: impl Into<PathBuf>, group: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            group: group.into(),
        }
    }

    /// `<group>.txt`
    pub fn input(&self) -> PathBuf {
        self.dir.join(format!("{}.txt", self.group))
    }

    /// `<group>_gainvsvoltage.txt`
    pub fn fit_table(&self) -> PathBuf {
        self.dir.join(format!("{}_gainvsvoltage.txt", self.group))
    }

    /// `<group>_gainvsvoltage.json`
    pub fn bundle(&self) -> PathBuf {
        self.dir.join(format!("{}_gainvsvoltage.json", self.group))
    }

    /// `<group>_<channel>_gainvsvoltage.svg`
    pub fn plot(&self, channel_id: u32) -> PathBuf {
        self.dir
            .join(format!("{}_{channel_id}_gainvsvoltage.svg", self.group))
    }
}

/// All computed outputs of a run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: Ingested,
    /// One entry per configured channel, in channel order.
    pub fits: Vec<ChannelFit>,
    /// Plot objects of the fitted channels, in channel order.
    pub plots: Vec<ChannelPlot>,
}

/// Prepare and fit a single channel.
pub fn fit_channel(
    measurements: &[Measurement],
    channel_id: u32,
    config: &FitConfig,
) -> (ChannelFit, Option<ChannelPlot>) {
    let sample = match prepare_channel(measurements, channel_id, config) {
        Ok(sample) => sample,
        Err(reason) => return (ChannelFit::Skipped { channel_id, reason }, None),
    };

    log::info!("Fitting {channel_id}");
    let params = fit_power_law(&sample.to_log(), config);
    let plot = ChannelPlot::new(sample, params, config);

    (ChannelFit::Fitted { channel_id, params }, Some(plot))
}

/// Fit every configured channel.
pub fn fit_channels(measurements: &[Measurement], config: &FitConfig) -> (Vec<ChannelFit>, Vec<ChannelPlot>) {
    let ids: Vec<u32> = config.channel_ids().collect();

    // `collect` on an indexed parallel iterator keeps input order.
    let outcomes: Vec<(ChannelFit, Option<ChannelPlot>)> = ids
        .par_iter()
        .map(|&id| fit_channel(measurements, id, config))
        .collect();

    let mut fits = Vec::with_capacity(outcomes.len());
    let mut plots = Vec::new();
    for (fit, plot) in outcomes {
        fits.push(fit);
        plots.extend(plot);
    }
    (fits, plots)
}

/// Load the group's measurements and fit every channel.
pub fn run_fit(config: &FitConfig, paths: &GroupPaths) -> Result<RunOutput, AppError> {
    let ingest = load_measurements(&paths.input())?;
    let (fits, plots) = fit_channels(&ingest.measurements, config);

    Ok(RunOutput { ingest, fits, plots })
}

/// Write the fit table, per-channel plots and the plot bundle.
pub fn write_outputs(run: &RunOutput, config: &FitConfig, paths: &GroupPaths) -> Result<(), AppError> {
    write_fit_table(&paths.fit_table(), &run.fits)?;

    for plot in &run.plots {
        write_channel_svg(&paths.plot(plot.channel_id), plot)?;
    }

    let bundle = PlotBundle::new(config.group.clone(), &run.plots);
    write_plot_bundle(&paths.bundle(), &bundle)?;
    Ok(())
}
