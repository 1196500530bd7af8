//! Metrics data types
//!
//! Types for per-request estimates, per-user totals, and per-team averages

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::team::Team;

/// Current UTC time as fixed-width RFC 3339 with millisecond precision.
///
/// Fixed width keeps lexical and chronological order identical, which the
/// request log relies on for time-window queries.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Estimated resource use of one prompt on one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationRow {
    pub model_id: String,
    pub tokens: u64,
    pub cost: f64,
    pub co2: f64,
    pub latency_ms: f64,
}

/// Cumulative metrics for a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetricTotals {
    pub user_id: String,
    pub total_co2: f64,
    pub total_cost: f64,
    pub total_latency: f64,
    pub updated_at: String,
}

impl UserMetricTotals {
    /// Create new totals stamped with the current time
    pub fn new(user_id: &str, total_co2: f64, total_cost: f64, total_latency: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_co2,
            total_cost,
            total_latency,
            updated_at: now_timestamp(),
        }
    }

    /// Check that every total is a finite, non-negative number
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("total_co2", self.total_co2),
            ("total_cost", self.total_cost),
            ("total_latency", self.total_latency),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "user {}: {} must be finite and non-negative, got {}",
                    self.user_id, name, value
                ));
            }
        }
        Ok(())
    }
}

/// Delta applied to a user's totals after a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub co2: f64,
    pub cost: f64,
    pub latency: f64,
}

/// Per-team averages over current user totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAverages {
    pub team: Team,
    pub count: u32,
    pub avg_co2: f64,
    pub avg_cost: f64,
    /// Whole milliseconds
    pub avg_latency: f64,
}

impl TeamAverages {
    /// Row for a team with no members
    pub fn empty(team: Team) -> Self {
        Self {
            team,
            count: 0,
            avg_co2: 0.0,
            avg_cost: 0.0,
            avg_latency: 0.0,
        }
    }
}

/// One logged model request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub user_id: String,
    pub model_id: String,
    pub prompt_chars: u64,
    pub response_chars: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub co2: f64,
    pub latency_ms: u64,
    pub efficiency_score: f64,
    pub created_at: String,
}

impl RequestRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Tokens processed per second of latency
    pub fn tokens_per_second(&self) -> f64 {
        if self.latency_ms > 0 {
            self.total_tokens() as f64 / (self.latency_ms as f64 / 1000.0)
        } else {
            0.0
        }
    }

    pub fn delta(&self) -> MetricDelta {
        MetricDelta {
            co2: self.co2,
            cost: self.cost,
            latency: self.latency_ms as f64,
        }
    }
}
