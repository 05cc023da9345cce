//! Mathematical utilities: weighted least squares and goodness-of-fit statistics.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
