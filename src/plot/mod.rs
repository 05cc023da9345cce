//! Plot objects and rendering.
//!
//! Fitting never touches a renderer. After all channels are fitted, the
//! pipeline builds one `ChannelPlot` per fitted channel; the same objects feed
//! the per-channel SVG files (`svg`) and the aggregate plot bundle
//! (`io::bundle`).

use serde::{Deserialize, Serialize};

use crate::domain::{ChannelSample, FitConfig, FitParams, LogChannelSample};
use crate::models::{sample_log_line, sample_power_curve};

pub mod svg;

pub use svg::*;

/// Points per sampled fit curve.
const CURVE_POINTS: usize = 101;

/// Everything needed to draw one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPlot {
    pub channel_id: u32,
    /// `<group>_<channel>`, used in titles.
    pub label: String,
    pub sample: ChannelSample,
    pub log_sample: LogChannelSample,
    pub params: FitParams,
    pub amplitude: f64,
    /// Fitted line in log-log space, over the data's log-voltage span.
    pub log_line: Vec<(f64, f64)>,
    /// Fitted power curve in linear space, over the fit window.
    pub power_curve: Vec<(f64, f64)>,
}

impl ChannelPlot {
    pub fn new(sample: ChannelSample, params: FitParams, config: &FitConfig) -> Self {
        let log_sample = sample.to_log();
        let label = format!("{}_{}", config.group, sample.channel_id);

        // A failed fit still gets its data drawn, just without curves.
        let (log_line, power_curve) = if params.is_finite() {
            let (x_min, x_max) = span(&log_sample.log_voltages).unwrap_or((0.0, 1.0));
            let (v_min, v_max) = config.fit_window;
            (
                sample_log_line(&params, x_min, x_max, CURVE_POINTS),
                sample_power_curve(&params, v_min, v_max, CURVE_POINTS),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        Self {
            channel_id: sample.channel_id,
            label,
            amplitude: params.amplitude(),
            sample,
            log_sample,
            params,
            log_line,
            power_curve,
        }
    }

    pub fn log_title(&self) -> String {
        format!("PMT {} gain vs voltage (log)", self.label)
    }

    pub fn linear_title(&self) -> String {
        format!("PMT {} gain vs voltage (linear)", self.label)
    }

    /// Whether every number in the plot object is finite.
    ///
    /// JSON has no NaN or infinity, so only finite plots can go in a bundle.
    pub fn is_finite(&self) -> bool {
        let s = &self.sample;
        let l = &self.log_sample;
        let p = &self.params;
        [&s.voltages, &s.voltage_errors, &s.gains, &s.gain_errors]
            .into_iter()
            .chain([&l.log_voltages, &l.log_voltage_errors, &l.log_gains, &l.log_gain_errors])
            .flatten()
            .chain(self.log_line.iter().chain(&self.power_curve).flat_map(|(x, y)| [x, y]))
            .chain([
                &p.constant,
                &p.constant_error,
                &p.exponent,
                &p.exponent_error,
                &p.chi_square,
                &p.fit_probability,
                &self.amplitude,
            ])
            .all(|v| v.is_finite())
    }
}

/// Min/max of the finite values in `values`.
pub(crate) fn span(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
