//! CSV export functionality
//!
//! Provides CSV serialization for estimates and team averages.

use std::path::Path;

use csv::Writer;
use serde::Serialize;

use super::{ExportableEstimate, ExportableTeamAverage};
use crate::CommandError;

fn write_records<T: Serialize>(records: &[T], path: &Path) -> Result<(), CommandError> {
    let file = std::fs::File::create(path)
        .map_err(|e| CommandError::Internal(format!("Failed to create CSV file: {}", e)))?;

    let mut writer = Writer::from_writer(file);

    // Headers come from the first record's field names
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| CommandError::Internal(format!("Failed to write CSV record: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| CommandError::Internal(format!("Failed to flush CSV: {}", e)))?;

    Ok(())
}

/// Write estimates to CSV format
pub fn write_estimates_csv(rows: &[ExportableEstimate], path: &Path) -> Result<(), CommandError> {
    write_records(rows, path)
}

/// Write team averages to CSV format
pub fn write_team_averages_csv(
    rows: &[ExportableTeamAverage],
    path: &Path,
) -> Result<(), CommandError> {
    write_records(rows, path)
}
