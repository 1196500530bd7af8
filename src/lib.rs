//! CarbonSight
//!
//! Estimates and tracks the CO2, cost, and latency of AI model usage.
//! It handles:
//! - Per-model prompt estimates from a coefficient table
//! - Per-user totals and per-team averages in SQLite
//! - Request logging and performance analytics
//! - Change-driven recomputation of team averages

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod export;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod watcher;

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use cli::{Cli, Commands, ExportTarget};
use commands::AggregateCache;
use config::AppConfig;
use db::Database;
use metrics::estimate_tokens;
use models::coefficients::{default_table, CoefficientTable};
use models::metrics::TeamAverages;

/// Application state shared by all commands
pub struct AppState {
    pub db: Option<Database>,
    pub table: CoefficientTable,
    pub config: AppConfig,
    team_cache: Mutex<AggregateCache<Vec<TeamAverages>>>,
}

impl AppState {
    pub fn new(db: Option<Database>, table: CoefficientTable, config: AppConfig) -> Self {
        Self {
            db,
            table,
            team_cache: Mutex::new(AggregateCache::new(config.cache_ttl)),
            config,
        }
    }

    /// The database, or `NotInitialized` if it failed to open
    pub fn db(&self) -> Result<&Database, CommandError> {
        self.db.as_ref().ok_or(CommandError::NotInitialized)
    }
}

/// Error type for commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Database not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Coefficient error: {0}")]
    Coefficients(#[from] models::coefficients::CoefficientError),

    #[error("{0}")]
    Team(#[from] models::team::TeamError),

    #[error("Provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] watcher::WatcherError),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Serialized as its message for the outer surface
impl serde::Serialize for CommandError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

// ============================================================================
// Application Setup
// ============================================================================

/// Load coefficients and open the database.
///
/// A bad coefficient file is fatal. A database that cannot be opened is
/// logged and leaves `db` unset, so estimates still work.
pub fn init_state(config: AppConfig) -> Result<AppState, CommandError> {
    let table = match &config.coefficients_path {
        Some(path) => CoefficientTable::from_path(path)?,
        None => default_table().clone(),
    };
    tracing::info!("Using {} model coefficients", table.len());

    let db_path = config.db_path.clone();
    tracing::info!("Database path: {:?}", db_path);

    // Create database directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!("Failed to create database directory: {}", e);
        }
    }

    let db = match Database::new(db_path.clone()) {
        Ok(database) => match database.initialize() {
            Ok(()) => {
                tracing::info!("Database initialized successfully at {:?}", db_path);
                Some(database)
            }
            Err(e) => {
                tracing::error!("Failed to initialize database schema: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::error!("Failed to create database connection: {}", e);
            None
        }
    };

    Ok(AppState::new(db, table, config))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::Internal(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Run a CLI command, printing its result as JSON
pub async fn run(cli: Cli) -> Result<(), CommandError> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()
            .map_err(|e| CommandError::Internal(e.to_string()))?;
        println!();
        return Ok(());
    };

    tracing::info!("Starting CarbonSight v{}", env!("CARGO_PKG_VERSION"));
    let state = init_state(config)?;

    match command {
        Commands::Estimate { prompt } => print_json(&commands::estimate(&state, &prompt)?),
        Commands::Teams { refresh } => {
            let rows = if refresh {
                commands::refresh_team_averages(&state)?
            } else {
                commands::get_team_averages(&state)?
            };
            print_json(&rows)
        }
        Commands::Assign {
            user_id,
            team,
            email,
        } => {
            let team = commands::set_user_team(&state, &user_id, email.as_deref(), &team)?;
            print_json(&serde_json::json!({ "user_id": user_id, "team": team }))
        }
        Commands::Record {
            user,
            model,
            input_tokens,
            output_tokens,
            latency_ms,
            prompt,
            response,
        } => {
            let report = commands::record_usage(
                &state,
                &commands::UsageInput {
                    user_id: &user,
                    model_id: &model,
                    prompt: &prompt,
                    response: &response,
                    input_tokens,
                    output_tokens,
                    latency_ms,
                },
            )?;
            print_json(&report)
        }
        Commands::Chat {
            user,
            model,
            prompt,
        } => {
            let client = provider::GeminiClient::new(
                &state.config.gemini_api_key,
                &state.config.gemini_base_url,
            )?;
            let response =
                commands::chat(&state, &client, &user, model.as_deref(), &prompt).await?;
            print_json(&response)
        }
        Commands::Performance {
            hours,
            model,
            by_model,
        } => {
            if by_model {
                print_json(&commands::get_model_comparison(&state, hours)?)
            } else {
                print_json(&commands::get_performance_summary(
                    &state,
                    hours,
                    model.as_deref(),
                )?)
            }
        }
        Commands::Recommend { model, hours } => print_json(
            &commands::get_efficiency_recommendations(&state, &model, Some(hours))?,
        ),
        Commands::Compare {
            baseline,
            actual,
            tokens,
            prompt,
        } => {
            let tokens = match (tokens, prompt) {
                (Some(tokens), _) => tokens,
                (None, Some(prompt)) => estimate_tokens(&prompt),
                (None, None) => {
                    return Err(CommandError::InvalidInput(
                        "either --tokens or --prompt is required".to_string(),
                    ))
                }
            };
            print_json(&commands::compare_models(&state, &baseline, &actual, tokens)?)
        }
        Commands::Export {
            what,
            format,
            prompt,
            dir,
        } => {
            let path = match what {
                ExportTarget::Estimates => {
                    let prompt = prompt.ok_or_else(|| {
                        CommandError::InvalidInput("--prompt is required for estimates".to_string())
                    })?;
                    commands::export_estimates(&state, &prompt, &format, dir)?
                }
                ExportTarget::Teams => commands::export_team_averages(&state, &format, dir)?,
            };
            print_json(&serde_json::json!({ "path": path }))
        }
        Commands::Watch { interval_ms } => {
            watch_team_averages(&state, Duration::from_millis(interval_ms)).await
        }
    }
}

/// Print team averages now and again after every relevant change.
///
/// In-process writes arrive through the table change feed. Writes from
/// other processes are caught by watching the database file.
async fn watch_team_averages(state: &AppState, interval: Duration) -> Result<(), CommandError> {
    let db = state.db()?;
    let changes = db.subscribe();

    let mut file_watcher = watcher::DatabaseWatcher::new(db.path().clone())?;
    file_watcher.start()?;

    print_json(&commands::get_team_averages(state)?)?;

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let file_events = file_watcher.poll();
        let rows = if !file_events.is_empty() {
            tracing::debug!("{} database file events", file_events.len());
            Some(commands::refresh_team_averages(state)?)
        } else {
            commands::recompute_on_change(state, &changes)?
        };

        if let Some(rows) = rows {
            print_json(&rows)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_state_with_bad_coefficients_fails() {
        let dir = std::env::temp_dir().join(format!("carbonsight_init_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let coefficients = dir.join("coefficients.json");
        std::fs::write(&coefficients, r#"{"m": {"cost_per_1k": -1, "co2_per_1k": 1, "base_latency_ms": 1}}"#)
            .unwrap();

        let config = AppConfig {
            db_path: dir.join("test.db"),
            coefficients_path: Some(coefficients),
            ..AppConfig::default()
        };
        assert!(matches!(init_state(config), Err(CommandError::Coefficients(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_init_state_opens_database() {
        let dir = std::env::temp_dir().join(format!("carbonsight_db_{}", std::process::id()));
        let config = AppConfig {
            db_path: dir.join("nested").join("test.db"),
            ..AppConfig::default()
        };

        let state = init_state(config).unwrap();
        assert!(state.db().is_ok());
        assert_eq!(state.table.len(), 5);
        assert_eq!(commands::get_team_averages(&state).unwrap().len(), 5);

        drop(state);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_command_error_serializes_as_message() {
        let err = CommandError::UnknownModel("gpt-9".to_string());
        assert_eq!(serde_json::to_string(&err).unwrap(), "\"Unknown model: gpt-9\"");
    }
}
