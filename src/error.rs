//! Fatal, run-level errors.
//!
//! Per-channel problems never surface here: a bad record is dropped and a bad
//! channel becomes a `ChannelFit::Skipped`. Only whole-run I/O failures abort.

use std::path::Path;

/// Exit code for an unreadable input source.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for an unwritable output sink.
pub const EXIT_OUTPUT: u8 = 3;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn unreadable_input(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::new(EXIT_INPUT, format!("Failed to read input '{}': {err}", path.display()))
    }

    pub fn unwritable_output(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::new(EXIT_OUTPUT, format!("Failed to write output '{}': {err}", path.display()))
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
