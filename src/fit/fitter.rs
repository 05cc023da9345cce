//! Errors-in-variables power-law fit in log space.
//!
//! Given a `LogChannelSample` with `x_i = ln V_i`, `y_i = ln G_i` and errors on
//! both axes, we minimize the effective-variance chi-square
//!
//! ```text
//! χ²(c0, c1) = Σ (y_i - c0 - c1 x_i)² / (σy_i² + c1² σx_i²)
//! ```
//!
//! A pass has two stages:
//! - Reweighting: weights from the current slope, weighted OLS for `(c0, c1)`,
//!   repeated until the slope settles. This lands close to the minimum but not
//!   on it, because it ignores how the weights move with the slope.
//! - Newton: damped Newton steps on the full χ², using its exact gradient and
//!   Hessian (slope dependence of the denominators included), until the step
//!   is negligible.
//!
//! Parameter errors come from the curvature at the minimum,
//! `cov = (½ ∂²χ²)⁻¹`, i.e. the `Δχ² = 1` contour.
//!
//! The channel fit runs one pass from the configured seed, then re-seeds
//! `refit_passes` more times from the previous pass's parameters. Re-seeded
//! passes start at the minimum and reproduce it.

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use crate::domain::{FitConfig, FitParams, LogChannelSample};
use crate::math::{chi_square_probability, weighted_least_squares};
use crate::models::{PARAM_COUNT, fill_design_row, predict_log};

/// Maximum reweighting iterations within one pass.
pub const MAX_REWEIGHTS: usize = 100;

/// Maximum Newton steps within one pass.
pub const MAX_NEWTON_STEPS: usize = 100;

/// Relative slope change below which reweighting stops.
const SLOPE_TOL: f64 = 1e-12;

/// Relative parameter step below which the minimizer stops.
const STEP_TOL: f64 = 1e-12;

/// Damping beyond which no descent step exists at working precision.
const MAX_DAMPING: f64 = 1e12;

/// Result of a single fit pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pass {
    pub constant: f64,
    pub exponent: f64,
    pub constant_error: f64,
    pub exponent_error: f64,
    pub chi_square: f64,
    /// Reweighting iterations used.
    pub reweights: usize,
    /// Newton steps used, rejected ones included.
    pub newton_steps: usize,
    pub converged: bool,
}

impl Pass {
    pub fn params(&self) -> (f64, f64) {
        (self.constant, self.exponent)
    }
}

/// χ² with its gradient and Hessian at one `(c0, c1)`.
#[derive(Debug, Clone, Copy)]
struct Expansion {
    chi_square: f64,
    gradient: Vector2<f64>,
    hessian: Matrix2<f64>,
}

/// Run one fit pass starting from `seed = (constant, exponent)`.
///
/// Returns `None` if the weighted solve fails (zero/non-finite errors,
/// non-finite data, or a degenerate voltage set) or the minimum has no
/// positive curvature.
pub fn refine(seed: (f64, f64), sample: &LogChannelSample) -> Option<Pass> {
    let x = &sample.log_voltages;
    let y = &sample.log_gains;
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return None;
    }

    let (start, reweights) = reweight(seed.1, sample)?;
    let (params, newton_steps, converged) = minimize(start, sample)?;

    let at = expand(sample, params[0], params[1]);
    let covariance = (at.hessian * 0.5).try_inverse()?;
    if covariance.iter().any(|v| !v.is_finite()) || covariance[(0, 0)] <= 0.0 || covariance[(1, 1)] <= 0.0 {
        return None;
    }

    Some(Pass {
        constant: params[0],
        exponent: params[1],
        constant_error: covariance[(0, 0)].sqrt(),
        exponent_error: covariance[(1, 1)].sqrt(),
        chi_square: at.chi_square,
        reweights,
        newton_steps,
        converged,
    })
}

/// Iteratively reweighted least squares from `slope`.
fn reweight(mut slope: f64, sample: &LogChannelSample) -> Option<(Vector2<f64>, usize)> {
    let design = design_matrix(&sample.log_voltages);
    let obs = DVector::from_column_slice(&sample.log_gains);

    let mut beta: Option<Vector2<f64>> = None;
    let mut reweights = 0;
    while reweights < MAX_REWEIGHTS {
        reweights += 1;
        let w = effective_weights(sample, slope);
        let fit = weighted_least_squares(&design, &obs, &w)?;

        let next = fit.beta[1];
        let settled = (next - slope).abs() <= SLOPE_TOL * next.abs().max(1.0);
        slope = next;
        beta = Some(Vector2::new(fit.beta[0], fit.beta[1]));
        if settled {
            break;
        }
    }

    beta.map(|b| (b, reweights))
}

/// Damped Newton descent on the full χ² from `start`.
///
/// Steps solve `(H + λ diag|H|) δ = -g`. A step is accepted only if χ² does
/// not increase; otherwise `λ` grows. Stops once the undamped Newton step from
/// the current point is negligible. Returns the minimum, the steps taken and
/// whether that tolerance was reached.
fn minimize(start: Vector2<f64>, sample: &LogChannelSample) -> Option<(Vector2<f64>, usize, bool)> {
    let mut p = start;
    let mut here = expand(sample, p[0], p[1]);
    if !here.chi_square.is_finite() {
        return None;
    }

    let mut damping = 0.0;
    let mut steps = 0;
    while steps < MAX_NEWTON_STEPS {
        let newton = here.hessian.cholesky().map(|c| c.solve(&(-here.gradient)));
        if newton.is_some_and(|step| negligible(&step, &p)) {
            return Some((p, steps, true));
        }
        steps += 1;

        let scale = Matrix2::from_diagonal(&Vector2::new(here.hessian[(0, 0)].abs(), here.hessian[(1, 1)].abs()));
        let trial = (here.hessian + scale * damping)
            .cholesky()
            .map(|c| p + c.solve(&(-here.gradient)));
        let accepted = trial.and_then(|trial| {
            let there = expand(sample, trial[0], trial[1]);
            (there.chi_square.is_finite() && there.chi_square <= here.chi_square).then_some((trial, there))
        });

        match accepted {
            Some((trial, there)) => {
                p = trial;
                here = there;
                damping /= 10.0;
            }
            None => {
                damping = (damping * 10.0).max(1e-3);
                if damping > MAX_DAMPING {
                    // No descent direction left at working precision.
                    return Some((p, steps, true));
                }
            }
        }
    }

    Some((p, steps, false))
}

fn negligible(step: &Vector2<f64>, at: &Vector2<f64>) -> bool {
    step.iter()
        .zip(at.iter())
        .all(|(s, v)| s.abs() <= STEP_TOL * v.abs().max(1.0))
}

/// Exact χ², gradient and Hessian of the effective-variance chi-square.
///
/// With `r = y - c0 - c1 x`, `D = σy² + c1² σx²` and `D' = 2 c1 σx²`:
///
/// ```text
/// ∂χ²/∂c0     = Σ -2r/D
/// ∂χ²/∂c1     = Σ -2rx/D - r²D'/D²
/// ∂²χ²/∂c0²   = Σ 2/D
/// ∂²χ²/∂c0∂c1 = Σ 2x/D + 2rD'/D²
/// ∂²χ²/∂c1²   = Σ 2x²/D + 4rxD'/D² - 2σx²r²/D² + 2r²D'²/D³
/// ```
fn expand(sample: &LogChannelSample, c0: f64, c1: f64) -> Expansion {
    let mut chi_square = 0.0;
    let mut gradient = Vector2::zeros();
    let mut hessian = Matrix2::zeros();

    let points = sample
        .log_voltages
        .iter()
        .zip(&sample.log_gains)
        .zip(sample.log_voltage_errors.iter().zip(&sample.log_gain_errors));
    for ((&x, &y), (&ex, &ey)) in points {
        let vx = ex * ex;
        let d = ey * ey + c1 * c1 * vx;
        let dd = 2.0 * c1 * vx;
        let r = y - predict_log(c0, c1, x);
        let d2 = d * d;

        chi_square += r * r / d;
        gradient[0] += -2.0 * r / d;
        gradient[1] += -2.0 * r * x / d - r * r * dd / d2;
        hessian[(0, 0)] += 2.0 / d;
        hessian[(0, 1)] += 2.0 * x / d + 2.0 * r * dd / d2;
        hessian[(1, 1)] +=
            2.0 * x * x / d + 4.0 * r * x * dd / d2 - 2.0 * vx * r * r / d2 + 2.0 * r * r * dd * dd / (d2 * d);
    }
    hessian[(1, 0)] = hessian[(0, 1)];

    Expansion {
        chi_square,
        gradient,
        hessian,
    }
}

/// Fit `ln G = c0 + c1 ln V` with re-seeded passes.
///
/// A failed solve does not abort the run: the channel gets NaN parameters and
/// the reporter writes them as-is.
pub fn fit_power_law(sample: &LogChannelSample, config: &FitConfig) -> FitParams {
    let degrees_of_freedom = sample.log_voltages.len().saturating_sub(PARAM_COUNT);

    let mut seed = config.seed;
    let mut last: Option<Pass> = None;
    for pass_idx in 0..=config.refit_passes {
        match refine(seed, sample) {
            Some(pass) => {
                log::trace!(
                    "PMT {} pass {pass_idx}: c0={} c1={} chi2={} reweights={} newton={}",
                    sample.channel_id,
                    pass.constant,
                    pass.exponent,
                    pass.chi_square,
                    pass.reweights,
                    pass.newton_steps
                );
                seed = pass.params();
                last = Some(pass);
            }
            None => {
                last = None;
                break;
            }
        }
    }

    let Some(pass) = last.filter(|p| p.constant.is_finite() && p.exponent.is_finite()) else {
        log::warn!("Fit for PMT {} did not produce finite parameters", sample.channel_id);
        return FitParams {
            constant: f64::NAN,
            constant_error: f64::NAN,
            exponent: f64::NAN,
            exponent_error: f64::NAN,
            chi_square: f64::NAN,
            degrees_of_freedom,
            fit_probability: f64::NAN,
        };
    };

    if !pass.converged {
        log::warn!(
            "Fit for PMT {} still moving after {} Newton steps in the last pass",
            sample.channel_id,
            MAX_NEWTON_STEPS
        );
    }

    FitParams {
        constant: pass.constant,
        constant_error: pass.constant_error,
        exponent: pass.exponent,
        exponent_error: pass.exponent_error,
        chi_square: pass.chi_square,
        degrees_of_freedom,
        fit_probability: chi_square_probability(pass.chi_square, degrees_of_freedom),
    }
}

fn design_matrix(x: &[f64]) -> DMatrix<f64> {
    let mut design = DMatrix::<f64>::zeros(x.len(), PARAM_COUNT);
    let mut row = [0.0; PARAM_COUNT];
    for (i, &xi) in x.iter().enumerate() {
        fill_design_row(xi, &mut row);
        for (j, &v) in row.iter().enumerate() {
            design[(i, j)] = v;
        }
    }
    design
}

/// `1 / (σy² + slope² σx²)` per point.
fn effective_weights(sample: &LogChannelSample, slope: f64) -> Vec<f64> {
    sample
        .log_gain_errors
        .iter()
        .zip(&sample.log_voltage_errors)
        .map(|(&ey, &ex)| 1.0 / (ey * ey + slope * slope * ex * ex))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{FULL_SCAN, SHORT_SCAN, power_law_channel};
    use crate::domain::ChannelSample;

    fn log_sample(voltages: &[f64], noise: f64, seed: u64) -> LogChannelSample {
        let rows = power_law_channel(1, voltages, 1e-5, 7.0, noise, seed);
        let refs: Vec<_> = rows.iter().collect();
        ChannelSample::from_measurements(1, &refs, 2.0).to_log()
    }

    /// Scattered data with tight gain errors, where the slope dependence of
    /// the weights matters.
    fn scattered_sample(seed: u64) -> LogChannelSample {
        let mut sample = log_sample(&FULL_SCAN, 0.05, seed);
        sample.log_gain_errors.iter_mut().for_each(|e| *e = 0.01);
        sample
    }

    #[test]
    fn recovers_exact_power_law() {
        let sample = log_sample(&FULL_SCAN, 0.0, 1);
        let fit = fit_power_law(&sample, &FitConfig::default());

        assert!((fit.exponent - 7.0).abs() < 1e-8, "exponent={}", fit.exponent);
        assert!((fit.constant - 1e-5f64.ln()).abs() < 1e-6, "constant={}", fit.constant);
        assert!((fit.amplitude() - 1e-5).abs() < 1e-9);
        assert!(fit.chi_square < 1e-12);
        assert_eq!(fit.degrees_of_freedom, 4);
        assert!((fit.fit_probability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recovers_noisy_exponent_for_both_scan_sizes() {
        for (voltages, ndf) in [(&SHORT_SCAN[..], 1), (&FULL_SCAN[..], 4)] {
            for seed in 0..5 {
                let sample = log_sample(voltages, 0.005, seed);
                let fit = fit_power_law(&sample, &FitConfig::default());

                assert!(fit.is_finite(), "seed={seed}: {fit:?}");
                assert!(fit.exponent_error > 0.0 && fit.constant_error > 0.0);
                let pull = (fit.exponent - 7.0) / fit.exponent_error;
                assert!(pull.abs() < 3.0, "seed={seed}: exponent={} pull={pull}", fit.exponent);
                assert_eq!(fit.degrees_of_freedom, ndf);
                assert!((0.0..=1.0).contains(&fit.fit_probability));
            }
        }
    }

    #[test]
    fn gradient_vanishes_at_the_returned_parameters() {
        for seed in [9, 21, 33] {
            let sample = scattered_sample(seed);
            let fit = fit_power_law(&sample, &FitConfig::default());
            let at = expand(&sample, fit.constant, fit.exponent);

            assert!(
                at.gradient.norm() < 1e-4 * (1.0 + at.chi_square),
                "seed={seed}: gradient={:?}",
                at.gradient
            );
            assert!((at.chi_square - fit.chi_square).abs() < 1e-12 * (1.0 + fit.chi_square));

            // The reweighting fixed point alone is not stationary on this data.
            let (start, _) = reweight(7.0, &sample).unwrap();
            let before = expand(&sample, start[0], start[1]);
            assert!(before.gradient.norm() > at.gradient.norm());
            assert!(before.chi_square >= at.chi_square);
        }
    }

    #[test]
    fn no_nearby_point_has_lower_chi_square() {
        let sample = scattered_sample(9);
        let fit = fit_power_law(&sample, &FitConfig::default());

        for i in -50..=50 {
            for j in -20..=20 {
                let c0 = fit.constant + f64::from(i) * 1e-3;
                let c1 = fit.exponent + f64::from(j) * 5e-4;
                let chi = expand(&sample, c0, c1).chi_square;
                assert!(
                    chi >= fit.chi_square - 1e-9,
                    "({c0}, {c1}) chi2={chi} < {}",
                    fit.chi_square
                );
            }
        }
    }

    #[test]
    fn analytic_derivatives_match_finite_differences() {
        let sample = scattered_sample(21);
        let (c0, c1) = (-12.0, 7.05);
        let h = 1e-6;
        let at = expand(&sample, c0, c1);
        let chi = |a: f64, b: f64| expand(&sample, a, b).chi_square;
        let grad = |a: f64, b: f64| expand(&sample, a, b).gradient;

        let g0 = (chi(c0 + h, c1) - chi(c0 - h, c1)) / (2.0 * h);
        let g1 = (chi(c0, c1 + h) - chi(c0, c1 - h)) / (2.0 * h);
        assert!((g0 - at.gradient[0]).abs() < 1e-4 * at.gradient[0].abs().max(1.0));
        assert!((g1 - at.gradient[1]).abs() < 1e-4 * at.gradient[1].abs().max(1.0));

        let h01 = (grad(c0, c1 + h)[0] - grad(c0, c1 - h)[0]) / (2.0 * h);
        let h11 = (grad(c0, c1 + h)[1] - grad(c0, c1 - h)[1]) / (2.0 * h);
        assert!((h01 - at.hessian[(0, 1)]).abs() < 1e-4 * at.hessian[(0, 1)].abs());
        assert!((h11 - at.hessian[(1, 1)]).abs() < 1e-4 * at.hessian[(1, 1)].abs());
    }

    #[test]
    fn without_voltage_errors_matches_weighted_least_squares() {
        let mut sample = scattered_sample(33);
        sample.log_voltage_errors.iter_mut().for_each(|e| *e = 0.0);
        let pass = refine((-30.0, 7.0), &sample).unwrap();

        let design = design_matrix(&sample.log_voltages);
        let obs = DVector::from_column_slice(&sample.log_gains);
        let wls = weighted_least_squares(&design, &obs, &effective_weights(&sample, 7.0)).unwrap();

        assert!((pass.constant - wls.beta[0]).abs() < 1e-8);
        assert!((pass.exponent - wls.beta[1]).abs() < 1e-9);
        assert!((pass.constant_error - wls.std_error(0)).abs() < 1e-8 * wls.std_error(0));
        assert!((pass.exponent_error - wls.std_error(1)).abs() < 1e-8 * wls.std_error(1));
    }

    #[test]
    fn pass_converges_to_the_same_point_from_any_seed() {
        let sample = log_sample(&FULL_SCAN, 0.01, 7);
        let a = refine((-30.0, 7.0), &sample).unwrap();
        let b = refine((0.0, 1.0), &sample).unwrap();
        assert!(a.converged && b.converged);
        assert!((a.exponent - b.exponent).abs() < 1e-9);
        assert!((a.constant - b.constant).abs() < 1e-8);
    }

    #[test]
    fn reseeded_passes_are_stable() {
        let sample = log_sample(&SHORT_SCAN, 0.01, 3);
        let first = refine((-30.0, 7.0), &sample).unwrap();
        let second = refine(first.params(), &sample).unwrap();
        assert!((first.exponent - second.exponent).abs() < 1e-10);
        assert!((first.chi_square - second.chi_square).abs() < 1e-10);
    }

    #[test]
    fn fit_is_deterministic() {
        let sample = log_sample(&FULL_SCAN, 0.01, 11);
        let config = FitConfig::default();
        let a = fit_power_law(&sample, &config);
        let b = fit_power_law(&sample, &config);
        assert_eq!(a.constant.to_bits(), b.constant.to_bits());
        assert_eq!(a.exponent.to_bits(), b.exponent.to_bits());
        assert_eq!(a.chi_square.to_bits(), b.chi_square.to_bits());
    }

    #[test]
    fn voltage_errors_inflate_parameter_errors() {
        let sample = log_sample(&FULL_SCAN, 0.01, 5);
        let mut wide = sample.clone();
        wide.log_voltage_errors.iter_mut().for_each(|e| *e *= 20.0);

        let config = FitConfig::default();
        let narrow_fit = fit_power_law(&sample, &config);
        let wide_fit = fit_power_law(&wide, &config);
        assert!(wide_fit.exponent_error > narrow_fit.exponent_error);
    }

    #[test]
    fn non_positive_gain_yields_nan_not_panic() {
        let mut sample = log_sample(&SHORT_SCAN, 0.0, 1);
        sample.log_gains[1] = f64::ln(-1.0);

        let fit = fit_power_law(&sample, &FitConfig::default());
        assert!(fit.constant.is_nan());
        assert!(fit.exponent.is_nan());
        assert!(fit.fit_probability.is_nan());
        assert_eq!(fit.degrees_of_freedom, 1);
    }
}
