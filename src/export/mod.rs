//! Export module for CSV and JSON export functionality
//!
//! Exports estimation tables and team averages in CSV and JSON formats.

pub mod csv_export;
pub mod json_export;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::metrics::{EstimationRow, TeamAverages};
use crate::CommandError;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(CommandError::InvalidInput(format!(
                "Invalid export format: {}. Use 'csv' or 'json'",
                s
            ))),
        }
    }
}

impl ExportFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Exportable estimate row for CSV/JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportableEstimate {
    pub model_id: String,
    pub tokens: u64,
    pub cost_usd: f64,
    pub co2_grams: f64,
    pub latency_ms: f64,
}

impl From<&EstimationRow> for ExportableEstimate {
    fn from(row: &EstimationRow) -> Self {
        Self {
            model_id: row.model_id.clone(),
            tokens: row.tokens,
            cost_usd: row.cost,
            co2_grams: row.co2,
            latency_ms: row.latency_ms,
        }
    }
}

/// Exportable team average row for CSV/JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportableTeamAverage {
    pub team: String,
    pub members: u32,
    pub avg_co2_grams: f64,
    pub avg_cost_usd: f64,
    pub avg_latency_ms: f64,
}

impl From<&TeamAverages> for ExportableTeamAverage {
    fn from(row: &TeamAverages) -> Self {
        Self {
            team: row.team.to_string(),
            members: row.count,
            avg_co2_grams: row.avg_co2,
            avg_cost_usd: row.avg_cost,
            avg_latency_ms: row.avg_latency,
        }
    }
}

/// Get the default export directory (Downloads folder or temp dir)
pub fn get_export_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::document_dir)
        .unwrap_or_else(std::env::temp_dir)
}

/// Generate a timestamped filename for exports
pub fn generate_export_filename(prefix: &str, extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, extension)
}

/// Full path for a new export file, in `dir` or the default directory
pub fn export_path(dir: Option<PathBuf>, prefix: &str, format: ExportFormat) -> PathBuf {
    dir.unwrap_or_else(get_export_directory)
        .join(generate_export_filename(prefix, format.extension()))
}

pub use csv_export::*;
pub use json_export::*;
