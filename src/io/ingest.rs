//! Measurement table ingest.
//!
//! The input is a plain text table, one record per line:
//!
//! ```text
//! PMT#  Voltage  Gain  GainError
//! 1     1200     0.35  0.01
//! ```
//!
//! Gain columns are in units of 10^7 and are scaled on the way in.
//!
//! Design goals:
//! - **Tolerant rows**: a record that does not parse is dropped and counted,
//!   never fatal. A truncated last line is simply the end of readable data.
//! - **No domain validation**: channel membership and sample sizes are decided
//!   later, per channel.
//! - **Deterministic**: records keep their input order.

use std::path::Path;

use crate::domain::{GAIN_SCALE, Measurement};
use crate::error::AppError;

/// A record that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecord {
    pub line: usize,
    pub message: String,
}

/// Ingest output: measurements in input order plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub measurements: Vec<Measurement>,
    pub dropped: Vec<DroppedRecord>,
}

impl Ingested {
    pub fn rows_used(&self) -> usize {
        self.measurements.len()
    }
}

/// Read and parse the measurement table at `path`.
pub fn load_measurements(path: &Path) -> Result<Ingested, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| AppError::unreadable_input(path, e))?;
    let ingested = parse_measurements(&text);

    log::info!(
        "Read {} record(s) from '{}' ({} dropped)",
        ingested.rows_used(),
        path.display(),
        ingested.dropped.len()
    );
    Ok(ingested)
}

/// Parse measurement records from text.
pub fn parse_measurements(text: &str) -> Ingested {
    let mut out = Ingested::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_record(trimmed) {
            Ok(m) => out.measurements.push(m),
            Err(message) => {
                log::debug!("Dropping record on line {line}: {message}");
                out.dropped.push(DroppedRecord { line, message });
            }
        }
    }

    out
}

fn parse_record(line: &str) -> Result<Measurement, String> {
    let mut fields = line.split_whitespace();
    let mut next = |name: &str| -> Result<f64, String> {
        let s = fields
            .next()
            .ok_or_else(|| format!("Missing field `{name}`"))?;
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("Invalid number '{s}' for `{name}`"))
    };

    let channel = next("channel")?;
    let voltage = next("voltage")?;
    let gain = next("gain")?;
    let gain_error = next("gain_error")?;

    Ok(Measurement {
        channel_id: parse_channel_id(channel)?,
        voltage,
        gain: gain * GAIN_SCALE,
        gain_error: gain_error * GAIN_SCALE,
    })
}

fn parse_channel_id(v: f64) -> Result<u32, String> {
    if v >= 1.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) {
        Ok(v as u32)
    } else {
        Err(format!("Invalid channel id {v}"))
    }
}
