//! Goodness-of-fit statistics.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Right-tail probability `P(χ²_ndf ≥ chi_square)`.
///
/// Follows the conventions of the historical fit tables:
/// `0` when there are no degrees of freedom or `chi_square < 0`, `1` when
/// `chi_square == 0`, NaN propagates.
pub fn chi_square_probability(chi_square: f64, ndf: usize) -> f64 {
    if chi_square.is_nan() {
        return f64::NAN;
    }
    if ndf == 0 || chi_square < 0.0 {
        return 0.0;
    }
    if chi_square == 0.0 {
        return 1.0;
    }

    match ChiSquared::new(ndf as f64) {
        Ok(dist) => dist.sf(chi_square),
        Err(_) => f64::NAN,
    }
}
