//! Input/output helpers.
//!
//! - measurement table ingest (`ingest`)
//! - fit table export (`export`)
//! - aggregate plot bundle read/write (`bundle`)

pub mod bundle;
pub mod export;
pub mod ingest;

pub use bundle::*;
pub use export::*;
pub use ingest::*;
