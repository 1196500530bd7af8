//! Metrics calculation module
//!
//! Pure computations over prompts, coefficients, and stored totals:
//! - Per-model prompt estimates
//! - Per-team averages
//! - Request performance analytics
//! - Model switch savings

pub mod aggregate;
pub mod estimate;
pub mod performance;
pub mod savings;

pub use aggregate::{aggregate_team_averages, TeamSums};
pub use estimate::{estimate_prompt, estimate_tokens};
