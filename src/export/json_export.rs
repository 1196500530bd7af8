//! JSON export functionality
//!
//! Wraps exported rows in a versioned envelope with export metadata.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::{ExportableEstimate, ExportableTeamAverage};
use crate::CommandError;

const EXPORT_VERSION: &str = "1.0.0";

/// Estimates export structure
#[derive(Debug, Clone, Serialize)]
pub struct EstimatesExportJson {
    pub export_date: String,
    pub export_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_chars: Option<usize>,
    pub model_count: usize,
    pub estimates: Vec<ExportableEstimate>,
}

/// Team averages export structure
#[derive(Debug, Clone, Serialize)]
pub struct TeamAveragesExportJson {
    pub export_date: String,
    pub export_version: &'static str,
    pub total_members: u32,
    pub teams: Vec<ExportableTeamAverage>,
}

fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), CommandError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::Internal(format!("Failed to serialize JSON: {}", e)))?;

    let mut file = std::fs::File::create(path)
        .map_err(|e| CommandError::Internal(format!("Failed to create JSON file: {}", e)))?;

    file.write_all(json.as_bytes())
        .map_err(|e| CommandError::Internal(format!("Failed to write JSON file: {}", e)))?;

    Ok(())
}

/// Write estimates to JSON format
pub fn write_estimates_json(
    rows: &[ExportableEstimate],
    prompt_chars: Option<usize>,
    path: &Path,
) -> Result<(), CommandError> {
    let export = EstimatesExportJson {
        export_date: chrono::Utc::now().to_rfc3339(),
        export_version: EXPORT_VERSION,
        prompt_chars,
        model_count: rows.len(),
        estimates: rows.to_vec(),
    };

    write_pretty(&export, path)
}

/// Write team averages to JSON format
pub fn write_team_averages_json(
    rows: &[ExportableTeamAverage],
    path: &Path,
) -> Result<(), CommandError> {
    let export = TeamAveragesExportJson {
        export_date: chrono::Utc::now().to_rfc3339(),
        export_version: EXPORT_VERSION,
        total_members: rows.iter().map(|r| r.members).sum(),
        teams: rows.to_vec(),
    };

    write_pretty(&export, path)
}
