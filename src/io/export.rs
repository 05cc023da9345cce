//! Write the fit table.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::ChannelFit;
use crate::error::AppError;
use crate::report::format_fit_table;

/// Write the comma-separated fit table for all channels.
pub fn write_fit_table(path: &Path, fits: &[ChannelFit]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| AppError::unwritable_output(path, e))?;
    file.write_all(format_fit_table(fits).as_bytes())
        .map_err(|e| AppError::unwritable_output(path, e))?;

    log::info!("Wrote fit table '{}'", path.display());
    Ok(())
}
