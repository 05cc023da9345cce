//! Synthetic power-law measurements for tests.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{GAIN_SCALE, Measurement};

/// Voltage scans used by the measurement campaign.
pub const SHORT_SCAN: [f64; 3] = [1200.0, 1400.0, 1600.0];
pub const FULL_SCAN: [f64; 6] = [1100.0, 1200.0, 1300.0, 1400.0, 1500.0, 1600.0];

/// Relative gain error quoted for every synthetic point.
pub const REL_GAIN_ERROR: f64 = 0.02;

/// Generate `gain = amplitude * V^exponent` with relative Gaussian noise.
///
/// `noise = 0.0` produces exact power-law data.
pub fn power_law_channel(
    channel_id: u32,
    voltages: &[f64],
    amplitude: f64,
    exponent: f64,
    noise: f64,
    seed: u64,
) -> Vec<Measurement> {
    let mut rng = StdRng::seed_from_u64(seed ^ u64::from(channel_id));
    let normal = Normal::new(0.0, 1.0).expect("unit normal");

    voltages
        .iter()
        .map(|&voltage| {
            let truth = amplitude * voltage.powf(exponent);
            let gain = truth * (1.0 + noise * normal.sample(&mut rng));
            Measurement {
                channel_id,
                voltage,
                gain,
                gain_error: gain * REL_GAIN_ERROR,
            }
        })
        .collect()
}

/// Render measurements as an input table (raw gain units).
pub fn to_table(rows: &[Measurement]) -> String {
    rows.iter()
        .map(|m| {
            format!(
                "{} {} {:e} {:e}\n",
                m.channel_id,
                m.voltage,
                m.gain / GAIN_SCALE,
                m.gain_error / GAIN_SCALE
            )
        })
        .collect()
}
