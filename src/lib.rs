//! `pmt-gain-curves` library crate.
//!
//! The binary (`gainvoltage`) is a thin wrapper around this library so that:
//!
//! - the fitting pipeline is testable without spawning processes
//! - fitting stays separate from rendering and file output

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
