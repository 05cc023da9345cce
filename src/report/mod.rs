//! Reporting: the fit table and terminal output.
//!
//! We keep formatting code in one place so the fitting code stays pure and
//! output changes are localized.

pub mod format;

pub use format::*;
