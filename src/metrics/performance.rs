//! Request performance analytics
//!
//! Scores individual model requests and summarizes windows of them:
//! - Prompt complexity (0.0 - 1.0)
//! - Efficiency score (0 - 100)
//! - Threshold ratings for latency, cost, and throughput
//! - Per-window summaries and per-model comparison
//! - Recommendations of more efficient models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::estimate::round_to;
use crate::models::metrics::RequestRecord;

/// Rating bucket for a single measured value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

/// Bucket boundaries for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
}

impl Thresholds {
    /// Rate a value where lower is better
    pub fn rate_lower_better(&self, value: f64) -> PerformanceRating {
        if value <= self.excellent {
            PerformanceRating::Excellent
        } else if value <= self.good {
            PerformanceRating::Good
        } else if value <= self.acceptable {
            PerformanceRating::Acceptable
        } else {
            PerformanceRating::Poor
        }
    }

    /// Rate a value where higher is better
    pub fn rate_higher_better(&self, value: f64) -> PerformanceRating {
        if value >= self.excellent {
            PerformanceRating::Excellent
        } else if value >= self.good {
            PerformanceRating::Good
        } else if value >= self.acceptable {
            PerformanceRating::Acceptable
        } else {
            PerformanceRating::Poor
        }
    }
}

/// Thresholds for latency, cost, and throughput
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    pub latency_ms: Thresholds,
    pub cost: Thresholds,
    pub tokens_per_second: Thresholds,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            latency_ms: Thresholds {
                excellent: 500.0,
                good: 1000.0,
                acceptable: 2000.0,
            },
            cost: Thresholds {
                excellent: 0.001,
                good: 0.005,
                acceptable: 0.01,
            },
            tokens_per_second: Thresholds {
                excellent: 50.0,
                good: 25.0,
                acceptable: 10.0,
            },
        }
    }
}

/// Ratings of one request against the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestRatings {
    pub latency: PerformanceRating,
    pub cost: PerformanceRating,
    pub throughput: PerformanceRating,
}

impl PerformanceThresholds {
    pub fn rate(&self, metrics: &RequestMetrics) -> RequestRatings {
        RequestRatings {
            latency: self.latency_ms.rate_lower_better(metrics.latency_ms as f64),
            cost: self.cost.rate_lower_better(metrics.cost),
            throughput: self
                .tokens_per_second
                .rate_higher_better(metrics.tokens_per_second),
        }
    }
}

/// Derived metrics for a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub model_id: String,
    pub prompt_chars: u64,
    pub response_chars: u64,
    pub latency_ms: u64,
    pub cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tokens_per_second: f64,
    pub cost_per_token: f64,
    pub cost_per_character: f64,
    pub prompt_complexity: f64,
    pub efficiency_score: f64,
}

impl RequestMetrics {
    /// Derive throughput, unit costs, complexity, and efficiency for a request
    pub fn track(
        prompt: &str,
        response: &str,
        model_id: &str,
        latency_ms: u64,
        cost: f64,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        let total_tokens = input_tokens.saturating_add(output_tokens);
        let response_chars = response.chars().count() as u64;

        let tokens_per_second = if latency_ms > 0 {
            total_tokens as f64 / (latency_ms as f64 / 1000.0)
        } else {
            0.0
        };
        let cost_per_token = if total_tokens > 0 {
            cost / total_tokens as f64
        } else {
            0.0
        };
        let cost_per_character = if response_chars > 0 {
            cost / response_chars as f64
        } else {
            0.0
        };

        let prompt_complexity = prompt_complexity(prompt);
        let efficiency_score =
            efficiency_score(latency_ms, cost, tokens_per_second, prompt_complexity);

        Self {
            model_id: model_id.to_string(),
            prompt_chars: prompt.chars().count() as u64,
            response_chars,
            latency_ms,
            cost,
            input_tokens,
            output_tokens,
            tokens_per_second: round_to(tokens_per_second, 2),
            cost_per_token: round_to(cost_per_token, 6),
            cost_per_character: round_to(cost_per_character, 6),
            prompt_complexity,
            efficiency_score,
        }
    }
}

/// Prompt complexity from length, special characters, and question marks
pub fn prompt_complexity(prompt: &str) -> f64 {
    let len = prompt.chars().count();
    if len == 0 {
        return 0.0;
    }

    let length_factor = (len as f64 / 1000.0).min(1.0);

    let special = prompt
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    let special_factor = (special as f64 / len as f64).min(1.0);

    let marks = prompt.chars().filter(|c| *c == '?' || *c == '!').count();
    let question_factor = (marks as f64 / 10.0).min(1.0);

    round_to(
        length_factor * 0.4 + special_factor * 0.3 + question_factor * 0.3,
        3,
    )
}

/// Overall efficiency on a 0-100 scale
pub fn efficiency_score(
    latency_ms: u64,
    cost: f64,
    tokens_per_second: f64,
    complexity: f64,
) -> f64 {
    let latency_score = (1.0 - latency_ms as f64 / 5000.0).max(0.0);
    let cost_score = (1.0 - cost / 0.1).max(0.0);
    let speed_score = (tokens_per_second / 100.0).min(1.0);

    let base = latency_score * 0.3 + cost_score * 0.4 + speed_score * 0.3;
    let efficiency = (base + complexity * 0.1) * 100.0;

    round_to(efficiency.clamp(0.0, 100.0), 1)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Latency distribution over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub avg_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

/// Cost distribution over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostStats {
    pub total: f64,
    pub avg: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Efficiency score distribution over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyStats {
    pub avg: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary of all requests in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_requests: usize,
    pub model_filter: Option<String>,
    pub latency: LatencyStats,
    pub cost: CostStats,
    pub efficiency: EfficiencyStats,
    pub avg_tokens_per_second: f64,
}

impl PerformanceSummary {
    /// Summarize records, optionally restricted to one model.
    /// Returns None when no record matches.
    pub fn from_records(records: &[RequestRecord], model: Option<&str>) -> Option<Self> {
        let selected: Vec<&RequestRecord> = records
            .iter()
            .filter(|r| model.map_or(true, |m| r.model_id == m))
            .collect();

        if selected.is_empty() {
            return None;
        }

        let latencies = sorted(selected.iter().map(|r| r.latency_ms as f64).collect());
        let costs = sorted(selected.iter().map(|r| r.cost).collect());
        let scores = sorted(selected.iter().map(|r| r.efficiency_score).collect());
        let tps: Vec<f64> = selected.iter().map(|r| r.tokens_per_second()).collect();

        // Nearest-rank index, clamped for small windows
        let p95_index = ((latencies.len() as f64 * 0.95) as usize).min(latencies.len() - 1);

        Some(Self {
            total_requests: selected.len(),
            model_filter: model.map(|m| m.to_string()),
            latency: LatencyStats {
                avg_ms: round_to(mean(&latencies), 2),
                median_ms: round_to(median(&latencies), 2),
                min_ms: latencies[0],
                max_ms: latencies[latencies.len() - 1],
                p95_ms: round_to(latencies[p95_index], 2),
            },
            cost: CostStats {
                total: round_to(costs.iter().sum(), 6),
                avg: round_to(mean(&costs), 6),
                median: round_to(median(&costs), 6),
                min: costs[0],
                max: costs[costs.len() - 1],
            },
            efficiency: EfficiencyStats {
                avg: round_to(mean(&scores), 1),
                median: round_to(median(&scores), 1),
                min: scores[0],
                max: scores[scores.len() - 1],
            },
            avg_tokens_per_second: round_to(mean(&tps), 2),
        })
    }
}

/// Aggregates for one model within a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub model_id: String,
    pub request_count: usize,
    pub avg_latency_ms: f64,
    pub avg_cost: f64,
    pub total_cost: f64,
    pub avg_efficiency_score: f64,
    pub avg_tokens_per_second: f64,
}

/// Side-by-side comparison of models used in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub models: Vec<ModelPerformance>,
    pub best_performing_model: String,
    pub most_cost_effective_model: String,
    pub fastest_model: String,
}

impl ModelComparison {
    /// Compare models by their requests. Returns None for an empty window.
    pub fn from_records(records: &[RequestRecord]) -> Option<Self> {
        let mut groups: BTreeMap<&str, Vec<&RequestRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.model_id.as_str()).or_default().push(record);
        }

        let models: Vec<ModelPerformance> = groups
            .into_iter()
            .map(|(model_id, group)| {
                let latencies: Vec<f64> = group.iter().map(|r| r.latency_ms as f64).collect();
                let costs: Vec<f64> = group.iter().map(|r| r.cost).collect();
                let scores: Vec<f64> = group.iter().map(|r| r.efficiency_score).collect();
                let tps: Vec<f64> = group.iter().map(|r| r.tokens_per_second()).collect();

                ModelPerformance {
                    model_id: model_id.to_string(),
                    request_count: group.len(),
                    avg_latency_ms: round_to(mean(&latencies), 2),
                    avg_cost: round_to(mean(&costs), 6),
                    total_cost: round_to(costs.iter().sum(), 6),
                    avg_efficiency_score: round_to(mean(&scores), 1),
                    avg_tokens_per_second: round_to(mean(&tps), 2),
                }
            })
            .collect();

        let best = models
            .iter()
            .max_by(|a, b| a.avg_efficiency_score.total_cmp(&b.avg_efficiency_score))?;
        let cheapest = models
            .iter()
            .min_by(|a, b| a.avg_cost.total_cmp(&b.avg_cost))?;
        let fastest = models
            .iter()
            .min_by(|a, b| a.avg_latency_ms.total_cmp(&b.avg_latency_ms))?;

        Some(Self {
            best_performing_model: best.model_id.clone(),
            most_cost_effective_model: cheapest.model_id.clone(),
            fastest_model: fastest.model_id.clone(),
            models,
        })
    }
}

/// Most recent requests of the current model used as its baseline
pub const RECOMMENDATION_SAMPLE: usize = 50;

/// Recent averages of the model currently in use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPerformance {
    pub request_count: usize,
    pub avg_latency_ms: f64,
    pub avg_cost: f64,
    pub avg_efficiency_score: f64,
}

/// A model that scored higher than the current one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeModel {
    pub model_id: String,
    /// Efficiency score points gained
    pub efficiency_improvement: f64,
    /// Average cost change; negative is cheaper
    pub cost_difference: f64,
    /// Average latency change; negative is faster
    pub latency_difference: f64,
}

/// More efficient alternatives to the current model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyRecommendations {
    pub current_model: String,
    pub current: CurrentPerformance,
    /// Best improvement first
    pub alternatives: Vec<AlternativeModel>,
    pub recommendation: Option<String>,
}

impl EfficiencyRecommendations {
    /// Rank models in `records` that beat `current_model` on efficiency.
    ///
    /// The baseline is the current model's last [`RECOMMENDATION_SAMPLE`]
    /// requests; records are expected oldest first. Returns None when the
    /// current model has no requests.
    pub fn from_records(records: &[RequestRecord], current_model: &str) -> Option<Self> {
        let history: Vec<&RequestRecord> = records
            .iter()
            .filter(|r| r.model_id == current_model)
            .collect();
        let recent = &history[history.len().saturating_sub(RECOMMENDATION_SAMPLE)..];
        if recent.is_empty() {
            return None;
        }

        let latency = mean(&recent.iter().map(|r| r.latency_ms as f64).collect::<Vec<_>>());
        let cost = mean(&recent.iter().map(|r| r.cost).collect::<Vec<_>>());
        let efficiency = mean(&recent.iter().map(|r| r.efficiency_score).collect::<Vec<_>>());

        let mut alternatives: Vec<AlternativeModel> = ModelComparison::from_records(records)
            .map(|c| c.models)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.model_id != current_model && m.avg_efficiency_score > efficiency)
            .map(|m| AlternativeModel {
                efficiency_improvement: round_to(m.avg_efficiency_score - efficiency, 1),
                cost_difference: round_to(m.avg_cost - cost, 6),
                latency_difference: round_to(m.avg_latency_ms - latency, 2),
                model_id: m.model_id,
            })
            .collect();
        alternatives.sort_by(|a, b| b.efficiency_improvement.total_cmp(&a.efficiency_improvement));

        let recommendation = alternatives.first().map(|best| {
            format!(
                "Consider switching to {} for {} points higher efficiency",
                best.model_id, best.efficiency_improvement
            )
        });

        Some(Self {
            current_model: current_model.to_string(),
            current: CurrentPerformance {
                request_count: recent.len(),
                avg_latency_ms: round_to(latency, 2),
                avg_cost: round_to(cost, 6),
                avg_efficiency_score: round_to(efficiency, 1),
            },
            alternatives,
            recommendation,
        })
    }
}
