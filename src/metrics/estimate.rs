//! Prompt cost estimation
//!
//! Turns a prompt into a per-model table of estimated cost, CO2, and
//! latency. Token counts are approximated from the prompt length instead of
//! running a tokenizer, so results are comparative, not exact.

use crate::models::coefficients::{CoefficientTable, ModelCoefficients};
use crate::models::metrics::EstimationRow;

/// Characters per estimated token
pub const CHARS_PER_TOKEN: u64 = 4;

/// Extra latency per sqrt(token), in milliseconds
pub const LATENCY_GROWTH_MS: f64 = 6.0;

/// Decimal places kept for cost and CO2
pub const COST_DECIMALS: i32 = 4;

/// Decimal places kept for latency
pub const LATENCY_DECIMALS: i32 = 2;

/// Round half away from zero to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Estimate tokens for a prompt: ceil(max(1, trimmed length) / 4)
pub fn estimate_tokens(prompt: &str) -> u64 {
    let chars = prompt.trim().chars().count() as u64;
    chars.max(1).div_ceil(CHARS_PER_TOKEN)
}

/// Estimated latency before rounding
pub fn latency_for(model: &ModelCoefficients, tokens: u64) -> f64 {
    model.base_latency_ms + (tokens as f64).sqrt() * LATENCY_GROWTH_MS
}

/// Estimate one model for a known token count
pub fn estimate_model(model: &ModelCoefficients, tokens: u64) -> EstimationRow {
    EstimationRow {
        model_id: model.model_id.clone(),
        tokens,
        cost: round_to(model.cost_for(tokens), COST_DECIMALS),
        co2: round_to(model.co2_for(tokens), COST_DECIMALS),
        latency_ms: round_to(latency_for(model, tokens), LATENCY_DECIMALS),
    }
}

/// Estimate a prompt against every model in the table, in table order
pub fn estimate_prompt(prompt: &str, table: &CoefficientTable) -> Vec<EstimationRow> {
    let tokens = estimate_tokens(prompt);
    tracing::debug!("Estimating {} tokens across {} models", tokens, table.len());

    table.iter().map(|model| estimate_model(model, tokens)).collect()
}
