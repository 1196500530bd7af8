//! Per-model coefficient table
//!
//! Holds the static cost, CO2, and latency coefficients used by the
//! estimator. A table is validated once when it is built or loaded and is
//! read-only afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Coefficient table errors
#[derive(Error, Debug)]
pub enum CoefficientError {
    #[error("Coefficient table is empty")]
    Empty,

    #[error("Duplicate model id: {0}")]
    Duplicate(String),

    #[error("Model {model}: {field} must be a finite positive number, got {value}")]
    NotPositive {
        model: String,
        field: &'static str,
        value: f64,
    },

    #[error("Model id must not be empty")]
    EmptyModelId,

    #[error("Failed to read coefficient file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse coefficient file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Coefficients for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCoefficients {
    pub model_id: String,
    /// Currency units per 1000 tokens
    pub cost_per_1k: f64,
    /// Grams of CO2e per 1000 tokens
    pub co2_per_1k: f64,
    /// Fixed per-request latency in milliseconds
    pub base_latency_ms: f64,
}

impl ModelCoefficients {
    pub fn new(model_id: &str, cost_per_1k: f64, co2_per_1k: f64, base_latency_ms: f64) -> Self {
        Self {
            model_id: model_id.to_string(),
            cost_per_1k,
            co2_per_1k,
            base_latency_ms,
        }
    }

    /// Cost for a token count, unrounded
    pub fn cost_for(&self, tokens: u64) -> f64 {
        (tokens as f64 / 1000.0) * self.cost_per_1k
    }

    /// CO2 for a token count, unrounded
    pub fn co2_for(&self, tokens: u64) -> f64 {
        (tokens as f64 / 1000.0) * self.co2_per_1k
    }

    fn validate(&self) -> Result<(), CoefficientError> {
        if self.model_id.trim().is_empty() {
            return Err(CoefficientError::EmptyModelId);
        }

        let fields = [
            ("cost_per_1k", self.cost_per_1k),
            ("co2_per_1k", self.co2_per_1k),
            ("base_latency_ms", self.base_latency_ms),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoefficientError::NotPositive {
                    model: self.model_id.clone(),
                    field,
                    value,
                });
            }
        }

        Ok(())
    }
}

/// Ordered, validated set of model coefficients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientTable {
    entries: Vec<ModelCoefficients>,
}

impl CoefficientTable {
    /// Build a table, validating every entry
    pub fn new(entries: Vec<ModelCoefficients>) -> Result<Self, CoefficientError> {
        if entries.is_empty() {
            return Err(CoefficientError::Empty);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if !seen.insert(entry.model_id.as_str()) {
                return Err(CoefficientError::Duplicate(entry.model_id.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// Parse a table from its JSON form. Document order is table order.
    pub fn from_json_str(json: &str) -> Result<Self, CoefficientError> {
        let OrderedRecords(records) = serde_json::from_str(json)?;

        let entries = records
            .into_iter()
            .map(|(model_id, r)| ModelCoefficients {
                model_id,
                cost_per_1k: r.cost_per_1k,
                co2_per_1k: r.co2_per_1k,
                base_latency_ms: r.base_latency_ms,
            })
            .collect();

        Self::new(entries)
    }

    /// Load a table from a JSON file
    pub fn from_path(path: &Path) -> Result<Self, CoefficientError> {
        let json = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&json)?;
        tracing::info!("Loaded {} model coefficients from {:?}", table.len(), path);
        Ok(table)
    }

    /// Look up a model by id
    pub fn get(&self, model_id: &str) -> Option<&ModelCoefficients> {
        self.entries.iter().find(|e| e.model_id == model_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelCoefficients> {
        self.entries.iter()
    }

    pub fn model_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.model_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Built-in canonical coefficients
    fn builtin() -> Self {
        Self {
            entries: vec![
                ModelCoefficients::new("gemini-2.0-flash", 0.0037, 0.3285, 1013.89),
                ModelCoefficients::new("gemini-1.5-flash", 0.0019, 0.2100, 850.00),
                ModelCoefficients::new("gemini-1.5-pro", 0.0125, 0.6400, 1820.50),
                ModelCoefficients::new("gpt-4o", 0.0050, 0.4500, 1250.00),
                ModelCoefficients::new("gpt-3.5-turbo", 0.0015, 0.1800, 690.00),
            ],
        }
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_TABLE: CoefficientTable = CoefficientTable::builtin();
}

/// Shared built-in coefficient table
pub fn default_table() -> &'static CoefficientTable {
    &DEFAULT_TABLE
}

/// JSON record for one model
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CoefficientRecord {
    cost_per_1k: f64,
    co2_per_1k: f64,
    base_latency_ms: f64,
}

/// JSON object entries in document order, duplicates kept for validation
struct OrderedRecords(Vec<(String, CoefficientRecord)>);

impl<'de> Deserialize<'de> for OrderedRecords {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecordsVisitor;

        impl<'de> Visitor<'de> for RecordsVisitor {
            type Value = OrderedRecords;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of model id to coefficients")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut records = Vec::new();
                while let Some((model_id, record)) =
                    map.next_entry::<String, CoefficientRecord>()?
                {
                    records.push((model_id, record));
                }
                Ok(OrderedRecords(records))
            }
        }

        deserializer.deserialize_map(RecordsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_valid() {
        let table = default_table();
        let rebuilt = CoefficientTable::new(table.iter().cloned().collect()).unwrap();
        assert_eq!(&rebuilt, table);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_default_table_is_shared() {
        assert!(std::ptr::eq(default_table(), default_table()));
    }

    #[test]
    fn test_get_model() {
        let table = default_table();
        let flash = table.get("gemini-2.0-flash").unwrap();
        assert_eq!(flash.cost_per_1k, 0.0037);
        assert_eq!(flash.co2_per_1k, 0.3285);
        assert_eq!(flash.base_latency_ms, 1013.89);
        assert!(table.get("unknown-model").is_none());
    }

    #[test]
    fn test_from_json_preserves_order() {
        let json = r#"{
            "zeta": {"cost_per_1k": 0.002, "co2_per_1k": 0.1, "base_latency_ms": 500.0},
            "alpha": {"cost_per_1k": 0.004, "co2_per_1k": 0.2, "base_latency_ms": 700.0},
            "mid": {"cost_per_1k": 0.003, "co2_per_1k": 0.3, "base_latency_ms": 600.0}
        }"#;

        let table = CoefficientTable::from_json_str(json).unwrap();
        assert_eq!(table.model_ids(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let json = r#"{
            "a": {"cost_per_1k": 0.002, "co2_per_1k": 0.1, "base_latency_ms": 500.0},
            "a": {"cost_per_1k": 0.004, "co2_per_1k": 0.2, "base_latency_ms": 700.0}
        }"#;

        let err = CoefficientTable::from_json_str(json).unwrap_err();
        assert!(matches!(err, CoefficientError::Duplicate(ref m) if m == "a"));
    }

    #[test]
    fn test_from_json_rejects_non_positive() {
        let json = r#"{"a": {"cost_per_1k": -0.002, "co2_per_1k": 0.1, "base_latency_ms": 500.0}}"#;
        let err = CoefficientTable::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            CoefficientError::NotPositive { field: "cost_per_1k", .. }
        ));

        let json = r#"{"a": {"cost_per_1k": 0.002, "co2_per_1k": 0.0, "base_latency_ms": 500.0}}"#;
        let err = CoefficientTable::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            CoefficientError::NotPositive { field: "co2_per_1k", .. }
        ));
    }

    #[test]
    fn test_from_json_rejects_non_numeric() {
        let json = r#"{"a": {"cost_per_1k": "cheap", "co2_per_1k": 0.1, "base_latency_ms": 500.0}}"#;
        let err = CoefficientTable::from_json_str(json).unwrap_err();
        assert!(matches!(err, CoefficientError::Parse(_)));
    }

    #[test]
    fn test_from_json_rejects_empty() {
        let err = CoefficientTable::from_json_str("{}").unwrap_err();
        assert!(matches!(err, CoefficientError::Empty));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let err = CoefficientTable::new(vec![ModelCoefficients::new("a", 0.1, f64::NAN, 10.0)])
            .unwrap_err();
        assert!(matches!(err, CoefficientError::NotPositive { .. }));

        let err = CoefficientTable::new(vec![ModelCoefficients::new(
            "a",
            0.1,
            0.1,
            f64::INFINITY,
        )])
        .unwrap_err();
        assert!(matches!(err, CoefficientError::NotPositive { .. }));
    }

    #[test]
    fn test_new_rejects_blank_model_id() {
        let err = CoefficientTable::new(vec![ModelCoefficients::new("  ", 0.1, 0.1, 10.0)])
            .unwrap_err();
        assert!(matches!(err, CoefficientError::EmptyModelId));
    }

    #[test]
    fn test_linear_cost_and_co2() {
        let model = ModelCoefficients::new("m", 0.01, 0.5, 100.0);
        assert!((model.cost_for(1000) - 0.01).abs() < 1e-12);
        assert!((model.co2_for(2000) - 1.0).abs() < 1e-12);
        assert_eq!(model.cost_for(0), 0.0);
    }
}
