//! Power-law gain model.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given log-voltage (for least squares)
//! - predict the gain given fitted parameters (for residuals/plots)
//!
//! In log space the model is the straight line `ln G = c0 + c1 ln V`; in linear
//! space it is `G = A V^k` with `A = exp(c0)` and `k = c1`.

use crate::domain::FitParams;

/// Number of free parameters (constant, exponent).
pub const PARAM_COUNT: usize = 2;

/// Fill a design row for log-voltage `x`.
///
/// The row includes the constant term first (intercept).
///
/// # Panics
/// Panics if `out` is shorter than `PARAM_COUNT`.
pub fn fill_design_row(x: f64, out: &mut [f64]) {
    out[0] = 1.0;
    out[1] = x;
}

/// `ln G` at log-voltage `log_voltage`.
pub fn predict_log(constant: f64, exponent: f64, log_voltage: f64) -> f64 {
    constant + exponent * log_voltage
}

/// `G = A V^k` at voltage `voltage`.
pub fn predict_gain(amplitude: f64, exponent: f64, voltage: f64) -> f64 {
    amplitude * voltage.powf(exponent)
}

/// Sample the fitted power curve on `n` evenly spaced voltages in `[v_min, v_max]`.
pub fn sample_power_curve(params: &FitParams, v_min: f64, v_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let amplitude = params.amplitude();
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let v = v_min + u * (v_max - v_min);
            (v, predict_gain(amplitude, params.exponent, v))
        })
        .collect()
}

/// Sample the fitted log-log line on `n` evenly spaced log-voltages.
pub fn sample_log_line(params: &FitParams, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, predict_log(params.constant, params.exponent, x))
        })
        .collect()
}
