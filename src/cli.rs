//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// CarbonSight CLI
#[derive(Parser, Debug)]
#[command(name = "carbonsight")]
#[command(about = "Estimate and track the CO2, cost, and latency of AI model usage")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate cost, CO2, and latency of a prompt on every model
    Estimate {
        prompt: String,
    },
    /// Show per-team averages
    Teams {
        /// Ignore cached averages
        #[arg(long)]
        refresh: bool,
    },
    /// Assign a user to a team
    Assign {
        user_id: String,
        team: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Record a completed request against a user's totals
    Record {
        #[arg(long)]
        user: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        input_tokens: u64,
        #[arg(long)]
        output_tokens: u64,
        #[arg(long)]
        latency_ms: u64,
        #[arg(long, default_value = "")]
        prompt: String,
        #[arg(long, default_value = "")]
        response: String,
    },
    /// Send a prompt to Gemini and record the actual usage
    Chat {
        #[arg(long)]
        user: String,
        #[arg(long)]
        model: Option<String>,
        prompt: String,
    },
    /// Summarize logged request performance
    Performance {
        /// Only include requests from the last N hours
        #[arg(long)]
        hours: Option<u32>,
        #[arg(long)]
        model: Option<String>,
        /// Compare models instead of summarizing
        #[arg(long)]
        by_model: bool,
    },
    /// Suggest models that ran more efficiently than the given one
    Recommend {
        model: String,
        /// Only include requests from the last N hours
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    /// CO2 and cost saved by switching from one model to another
    Compare {
        baseline: String,
        actual: String,
        #[arg(long, conflicts_with = "prompt")]
        tokens: Option<u64>,
        /// Estimate the token count from a prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Export estimates or team averages to a file
    Export {
        #[arg(value_enum)]
        what: ExportTarget,
        #[arg(long, default_value = "csv")]
        format: String,
        /// Prompt to estimate, required for estimate exports
        #[arg(long)]
        prompt: Option<String>,
        /// Output directory (default: Downloads)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print team averages whenever the database changes
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum ExportTarget {
    Estimates,
    Teams,
}
