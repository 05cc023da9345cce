//! Per-channel preparation: selection, sample-size validation, log transform.
//!
//! The power law `gain = A * V^k` becomes the straight line
//! `ln(gain) = ln(A) + k * ln(V)` in log space, so the fitter only ever sees a
//! linear problem. Errors are carried over with `σ_ln(x) = σ_x / x`.

use crate::domain::{ChannelSample, FitConfig, LogChannelSample, Measurement, SkipReason};

/// Sample sizes the measurement campaign produces: a short scan or a full scan.
pub const VALID_SAMPLE_SIZES: [usize; 2] = [3, 6];

/// Select the measurements of one channel, preserving input order.
pub fn select_channel(measurements: &[Measurement], channel_id: u32) -> Vec<&Measurement> {
    measurements
        .iter()
        .filter(|m| m.channel_id == channel_id)
        .collect()
}

pub fn validate_sample_size(n: usize) -> Result<(), SkipReason> {
    if VALID_SAMPLE_SIZES.contains(&n) {
        Ok(())
    } else {
        Err(SkipReason::InvalidSampleSize { found: n })
    }
}

impl ChannelSample {
    /// Build a sample from already-selected rows.
    ///
    /// The input table has no voltage uncertainty column, so every point gets
    /// the same absolute `voltage_error`.
    pub fn from_measurements(channel_id: u32, rows: &[&Measurement], voltage_error: f64) -> Self {
        Self {
            channel_id,
            voltages: rows.iter().map(|m| m.voltage).collect(),
            voltage_errors: vec![voltage_error; rows.len()],
            gains: rows.iter().map(|m| m.gain).collect(),
            gain_errors: rows.iter().map(|m| m.gain_error).collect(),
        }
    }

    pub fn to_log(&self) -> LogChannelSample {
        LogChannelSample {
            channel_id: self.channel_id,
            log_voltages: self.voltages.iter().map(|v| v.ln()).collect(),
            log_voltage_errors: relative_errors(&self.voltage_errors, &self.voltages),
            log_gains: self.gains.iter().map(|g| g.ln()).collect(),
            log_gain_errors: relative_errors(&self.gain_errors, &self.gains),
        }
    }
}

fn relative_errors(errors: &[f64], values: &[f64]) -> Vec<f64> {
    errors.iter().zip(values).map(|(e, v)| e / v).collect()
}

/// Select and validate one channel.
///
/// A channel whose row count is not 3 or 6 is skipped with a warning; it never
/// fails the run.
pub fn prepare_channel(
    measurements: &[Measurement],
    channel_id: u32,
    config: &FitConfig,
) -> Result<ChannelSample, SkipReason> {
    let rows = select_channel(measurements, channel_id);

    if let Err(reason) = validate_sample_size(rows.len()) {
        log::warn!("Improper number of data points for PMT {channel_id} ({reason}). SKIPPING");
        return Err(reason);
    }

    Ok(ChannelSample::from_measurements(channel_id, &rows, config.voltage_error))
}
