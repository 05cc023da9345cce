//! Shared domain types.
//!
//! Every pipeline stage hands the next one an owned, immutable value built from
//! these types:
//!
//! - `Measurement`s come out of ingest
//! - `ChannelSample` / `LogChannelSample` come out of channel preparation
//! - `FitParams` / `ChannelFit` come out of the fitter and feed the reports

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw gain values in the input table are in units of 10^7.
pub const GAIN_SCALE: f64 = 1e7;

/// One parsed input record.
///
/// `gain` and `gain_error` are already scaled to physical gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub channel_id: u32,
    pub voltage: f64,
    pub gain: f64,
    pub gain_error: f64,
}

/// A single channel's measurements in linear space.
///
/// All four sequences have the same length, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    pub channel_id: u32,
    pub voltages: Vec<f64>,
    pub voltage_errors: Vec<f64>,
    pub gains: Vec<f64>,
    pub gain_errors: Vec<f64>,
}

/// A channel's measurements after the log transform.
///
/// Errors are propagated as `σ_ln(x) = σ_x / x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogChannelSample {
    pub channel_id: u32,
    pub log_voltages: Vec<f64>,
    pub log_voltage_errors: Vec<f64>,
    pub log_gains: Vec<f64>,
    pub log_gain_errors: Vec<f64>,
}

/// Fitted parameters of `ln(gain) = constant + exponent * ln(voltage)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub constant: f64,
    pub constant_error: f64,
    pub exponent: f64,
    pub exponent_error: f64,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub fit_probability: f64,
}

impl FitParams {
    /// Amplitude `A` of the un-logged power law `gain = A * V^k`.
    pub fn amplitude(&self) -> f64 {
        self.constant.exp()
    }

    /// Whether the solver produced usable parameters and errors.
    pub fn is_finite(&self) -> bool {
        self.constant.is_finite()
            && self.exponent.is_finite()
            && self.constant_error.is_finite()
            && self.exponent_error.is_finite()
    }
}

/// Why a channel was not fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    #[error("expected 3 or 6 data points, found {found}")]
    InvalidSampleSize { found: usize },
}

/// Per-channel outcome of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ChannelFit {
    Fitted { channel_id: u32, params: FitParams },
    Skipped { channel_id: u32, reason: SkipReason },
}

impl ChannelFit {
    pub fn channel_id(&self) -> u32 {
        match self {
            ChannelFit::Fitted { channel_id, .. } | ChannelFit::Skipped { channel_id, .. } => *channel_id,
        }
    }

    pub fn params(&self) -> Option<&FitParams> {
        match self {
            ChannelFit::Fitted { params, .. } => Some(params),
            ChannelFit::Skipped { .. } => None,
        }
    }
}

/// Run configuration.
///
/// The numeric defaults are the empirically tuned values the detector group has
/// always used; they are kept configurable rather than derived.
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    /// Channel-group identifier; names the input file and prefixes all outputs.
    pub group: String,
    /// Channels `1..=channel_count` are processed.
    pub channel_count: u32,
    /// Fixed absolute voltage uncertainty (V) assigned to every point.
    pub voltage_error: f64,
    /// Starting `(constant, exponent)` for the first fit pass.
    pub seed: (f64, f64),
    /// Number of re-seeded passes after the initial one.
    pub refit_passes: usize,
    /// Voltage window (V) of the fit. Advisory: bounds the plotted power curve.
    pub fit_window: (f64, f64),
}

impl FitConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }

    /// Channel ids handled by this run, in increasing order.
    pub fn channel_ids(&self) -> impl Iterator<Item = u32> + '_ {
        1..=self.channel_count
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            channel_count: 10,
            voltage_error: 2.0,
            seed: (-30.0, 7.0),
            refit_passes: 9,
            fit_window: (1000.0, 2000.0),
        }
    }
}
