//! Channel data preparation.
//!
//! - channel selection, sample-size validation and log transform (`channel`)
//! - seeded synthetic power-law data for tests (`synthetic`)

pub mod channel;
#[cfg(test)]
pub mod synthetic;

pub use channel::*;
