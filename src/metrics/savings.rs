//! Model switch savings
//!
//! Compares the CO2 and cost of running the same token volume on a baseline
//! model versus the model actually used.

use serde::{Deserialize, Serialize};

use crate::models::coefficients::CoefficientTable;

/// CO2 and cost saved by using `actual` instead of `baseline`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchSavings {
    pub baseline_model: String,
    pub actual_model: String,
    pub tokens: u64,
    pub co2_saved: f64,
    pub cost_saved: f64,
    pub co2_saved_percent: f64,
    pub cost_saved_percent: f64,
}

fn percent_saved(baseline: f64, actual: f64) -> f64 {
    if baseline > 0.0 {
        (baseline - actual) / baseline * 100.0
    } else {
        0.0
    }
}

/// Savings are clamped at zero when the actual model is the heavier one.
/// Returns None if either model is missing from the table.
pub fn compare_models(
    table: &CoefficientTable,
    baseline: &str,
    actual: &str,
    tokens: u64,
) -> Option<SwitchSavings> {
    let base = table.get(baseline)?;
    let used = table.get(actual)?;

    let base_co2 = base.co2_for(tokens);
    let used_co2 = used.co2_for(tokens);
    let base_cost = base.cost_for(tokens);
    let used_cost = used.cost_for(tokens);

    Some(SwitchSavings {
        baseline_model: baseline.to_string(),
        actual_model: actual.to_string(),
        tokens,
        co2_saved: (base_co2 - used_co2).max(0.0),
        cost_saved: (base_cost - used_cost).max(0.0),
        co2_saved_percent: percent_saved(base_co2, used_co2),
        cost_saved_percent: percent_saved(base_cost, used_cost),
    })
}
