//! Domain model: measurements, channel samples, fit results, configuration.

pub mod types;

pub use types::*;
