//! Power-law fitting.
//!
//! Responsibilities:
//!
//! - effective-variance weighted regression in log space (one pass)
//! - re-seeded passes and extraction of errors and goodness of fit

pub mod fitter;

pub use fitter::*;
