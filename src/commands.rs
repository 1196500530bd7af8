//! Application commands
//!
//! The operations exposed to the CLI. Each command takes the shared
//! [`AppState`], reads a snapshot from the store, and runs the pure metric
//! computations outside the connection lock.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::db::changes::TableChange;
use crate::db::{self, Database};
use crate::export::{
    self, csv_export, json_export, ExportFormat, ExportableEstimate, ExportableTeamAverage,
};
use crate::metrics::performance::{
    EfficiencyRecommendations, ModelComparison, PerformanceSummary, PerformanceThresholds,
    RequestMetrics, RequestRatings,
};
use crate::metrics::savings::{self, SwitchSavings};
use crate::metrics::{aggregate_team_averages, estimate_prompt};
use crate::models::coefficients::ModelCoefficients;
use crate::models::metrics::{now_timestamp, EstimationRow, RequestRecord, TeamAverages};
use crate::models::team::{parse_memberships, Team};
use crate::provider::ChatProvider;
use crate::{AppState, CommandError};

/// Tables whose rows feed the team aggregation
const AGGREGATE_INPUT_TABLES: [&str; 2] = ["user_metrics", "user_profiles"];

// ============================================================================
// TTL Cache for Team Averages
// ============================================================================

/// In-memory cache for a single aggregate with time-to-live expiration.
///
/// Reads return `None` once the TTL has elapsed or after an explicit
/// invalidation, causing the next caller to recompute.
pub struct AggregateCache<T: Clone> {
    data: Option<(Instant, T)>,
    ttl: Duration,
}

impl<T: Clone> AggregateCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { data: None, ttl }
    }

    pub fn get(&self) -> Option<T> {
        self.data.as_ref().and_then(|(time, data)| {
            if time.elapsed() < self.ttl {
                Some(data.clone())
            } else {
                None
            }
        })
    }

    pub fn set(&mut self, data: T) {
        self.data = Some((Instant::now(), data));
    }

    pub fn invalidate(&mut self) {
        self.data = None;
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Outcome of logging one model request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub request_id: i64,
    pub user_id: String,
    pub co2: f64,
    pub metrics: RequestMetrics,
    pub ratings: RequestRatings,
}

/// A chat reply with the metrics it actually incurred
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub usage: UsageReport,
}

/// Raw measurements of one completed request
#[derive(Debug, Clone)]
pub struct UsageInput<'a> {
    pub user_id: &'a str,
    pub model_id: &'a str,
    pub prompt: &'a str,
    pub response: &'a str,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
}

// ============================================================================
// Estimation
// ============================================================================

/// Estimate a prompt against every configured model
pub fn estimate(state: &AppState, prompt: &str) -> Result<Vec<EstimationRow>, CommandError> {
    Ok(estimate_prompt(prompt, &state.table))
}

/// CO2 and cost saved by running `tokens` on `actual` instead of `baseline`
pub fn compare_models(
    state: &AppState,
    baseline: &str,
    actual: &str,
    tokens: u64,
) -> Result<SwitchSavings, CommandError> {
    for model in [baseline, actual] {
        lookup_model(state, model)?;
    }
    savings::compare_models(&state.table, baseline, actual, tokens)
        .ok_or_else(|| CommandError::UnknownModel(format!("{} or {}", baseline, actual)))
}

fn lookup_model<'a>(state: &'a AppState, model_id: &str) -> Result<&'a ModelCoefficients, CommandError> {
    state
        .table
        .get(model_id)
        .ok_or_else(|| CommandError::UnknownModel(model_id.to_string()))
}

// ============================================================================
// Team Averages
// ============================================================================

/// Get per-team averages.
///
/// Serves from the cache while fresh, then tries the precomputed view, and
/// falls back to aggregating raw rows if the view cannot be read.
pub fn get_team_averages(state: &AppState) -> Result<Vec<TeamAverages>, CommandError> {
    if let Ok(cache) = state.team_cache.lock() {
        if let Some(cached) = cache.get() {
            return Ok(cached);
        }
    }

    let db = state.db()?;
    let rows = match db.with_connection(db::queries::get_team_averages_from_view) {
        Ok(rows) if rows.len() == Team::ALL.len() => rows,
        Ok(rows) => {
            tracing::warn!(
                "team_averages view returned {} rows, recomputing from raw data",
                rows.len()
            );
            aggregate_from_raw(db)?
        }
        Err(e) => {
            tracing::warn!("team_averages view unavailable ({}), recomputing from raw data", e);
            aggregate_from_raw(db)?
        }
    };

    if let Ok(mut cache) = state.team_cache.lock() {
        cache.set(rows.clone());
    }

    Ok(rows)
}

/// Client-side aggregation over a fresh snapshot of totals and memberships
fn aggregate_from_raw(db: &Database) -> Result<Vec<TeamAverages>, CommandError> {
    let (totals, pairs) = db.with_connection(|conn| {
        Ok((
            db::queries::get_all_user_totals(conn)?,
            db::queries::get_team_memberships(conn)?,
        ))
    })?;

    let memberships = parse_memberships(pairs);
    for warning in &memberships.warnings {
        tracing::warn!(
            "User {} has unknown team {:?}, excluded from team averages",
            warning.user_id,
            warning.value
        );
    }

    Ok(aggregate_team_averages(&totals, &memberships.map))
}

/// Drop cached team averages
pub fn invalidate_team_averages(state: &AppState) {
    if let Ok(mut cache) = state.team_cache.lock() {
        cache.invalidate();
    }
}

/// Recompute team averages, bypassing the cache
pub fn refresh_team_averages(state: &AppState) -> Result<Vec<TeamAverages>, CommandError> {
    invalidate_team_averages(state);
    get_team_averages(state)
}

/// Drain pending table changes and recompute if any touched aggregation
/// inputs. Returns the fresh averages, or `None` when nothing relevant
/// changed.
pub fn recompute_on_change(
    state: &AppState,
    changes: &Receiver<TableChange>,
) -> Result<Option<Vec<TeamAverages>>, CommandError> {
    let relevant = changes
        .try_iter()
        .filter(|c| AGGREGATE_INPUT_TABLES.contains(&c.table.as_str()))
        .count();

    if relevant == 0 {
        return Ok(None);
    }

    tracing::debug!("{} aggregation input changes, recomputing team averages", relevant);
    refresh_team_averages(state).map(Some)
}

/// Set a user's team, creating the profile if needed
pub fn set_user_team(
    state: &AppState,
    user_id: &str,
    email: Option<&str>,
    team: &str,
) -> Result<Team, CommandError> {
    let team: Team = team.parse()?;
    state
        .db()?
        .with_connection(|conn| db::queries::upsert_user_profile(conn, user_id, email, Some(team)))?;

    invalidate_team_averages(state);
    tracing::info!("User {} assigned to team {}", user_id, team);
    Ok(team)
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Log a completed request and add its cost, CO2, and latency to the user's
/// totals
pub fn record_usage(state: &AppState, input: &UsageInput<'_>) -> Result<UsageReport, CommandError> {
    if input.user_id.trim().is_empty() {
        return Err(CommandError::InvalidInput("user id must not be empty".to_string()));
    }
    let coefficients = lookup_model(state, input.model_id)?;

    let tokens = input
        .input_tokens
        .checked_add(input.output_tokens)
        .filter(|total| i64::try_from(*total).is_ok())
        .ok_or_else(|| {
            CommandError::InvalidInput(format!(
                "token counts out of range: {} input, {} output",
                input.input_tokens, input.output_tokens
            ))
        })?;
    if i64::try_from(input.latency_ms).is_err() {
        return Err(CommandError::InvalidInput(format!(
            "latency out of range: {} ms",
            input.latency_ms
        )));
    }
    let cost = coefficients.cost_for(tokens);
    let co2 = coefficients.co2_for(tokens);

    let metrics = RequestMetrics::track(
        input.prompt,
        input.response,
        input.model_id,
        input.latency_ms,
        cost,
        input.input_tokens,
        input.output_tokens,
    );
    let ratings = PerformanceThresholds::default().rate(&metrics);

    let record = RequestRecord {
        user_id: input.user_id.to_string(),
        model_id: input.model_id.to_string(),
        prompt_chars: metrics.prompt_chars,
        response_chars: metrics.response_chars,
        input_tokens: input.input_tokens,
        output_tokens: input.output_tokens,
        cost,
        co2,
        latency_ms: input.latency_ms,
        efficiency_score: metrics.efficiency_score,
        created_at: now_timestamp(),
    };

    let request_id = state.db()?.with_connection(|conn| {
        let tx = conn.unchecked_transaction()?;
        let id = db::queries::insert_request(&tx, &record)?;
        db::queries::add_user_delta(&tx, &record.user_id, &record.delta())?;
        tx.commit()?;
        Ok(id)
    })?;

    invalidate_team_averages(state);
    tracing::info!(
        "Recorded request {} for {} on {}: {} tokens, {:.6} cost, {:.4} g CO2",
        request_id,
        record.user_id,
        record.model_id,
        tokens,
        cost,
        co2
    );

    Ok(UsageReport {
        request_id,
        user_id: record.user_id,
        co2,
        metrics,
        ratings,
    })
}

/// Send a prompt to the provider and record the metrics it actually incurred
pub async fn chat<P: ChatProvider>(
    state: &AppState,
    provider: &P,
    user_id: &str,
    model: Option<&str>,
    prompt: &str,
) -> Result<ChatResponse, CommandError> {
    let model = model.unwrap_or(&state.config.default_model);
    lookup_model(state, model)?;

    if prompt.trim().is_empty() {
        return Err(CommandError::InvalidInput("prompt must not be empty".to_string()));
    }

    let started = Instant::now();
    let completion = provider.generate(model, prompt).await?;
    let latency_ms = started.elapsed().as_millis() as u64;

    let usage = record_usage(
        state,
        &UsageInput {
            user_id,
            model_id: model,
            prompt,
            response: &completion.text,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            latency_ms,
        },
    )?;

    Ok(ChatResponse {
        text: completion.text,
        usage,
    })
}

// ============================================================================
// Performance Analytics
// ============================================================================

/// Summarize logged requests in the last `hours` hours
pub fn get_performance_summary(
    state: &AppState,
    hours: Option<u32>,
    model: Option<&str>,
) -> Result<Option<PerformanceSummary>, CommandError> {
    let records = state
        .db()?
        .with_connection(|conn| db::queries::get_recent_requests(conn, hours))?;

    Ok(PerformanceSummary::from_records(&records, model))
}

/// Compare the models used in the last `hours` hours
pub fn get_model_comparison(
    state: &AppState,
    hours: Option<u32>,
) -> Result<Option<ModelComparison>, CommandError> {
    let records = state
        .db()?
        .with_connection(|conn| db::queries::get_recent_requests(conn, hours))?;

    Ok(ModelComparison::from_records(&records))
}

/// Models that ran more efficiently than `model` in the last `hours` hours.
/// Returns None when `model` has no logged requests in the window.
pub fn get_efficiency_recommendations(
    state: &AppState,
    model: &str,
    hours: Option<u32>,
) -> Result<Option<EfficiencyRecommendations>, CommandError> {
    lookup_model(state, model)?;
    let records = state
        .db()?
        .with_connection(|conn| db::queries::get_recent_requests(conn, hours))?;

    Ok(EfficiencyRecommendations::from_records(&records, model))
}

// ============================================================================
// Export Commands
// ============================================================================

/// Export a prompt's estimates. Returns the file path of the exported file.
pub fn export_estimates(
    state: &AppState,
    prompt: &str,
    format: &str,
    dir: Option<PathBuf>,
) -> Result<String, CommandError> {
    let format = format.parse::<ExportFormat>()?;
    let rows: Vec<ExportableEstimate> = estimate(state, prompt)?.iter().map(Into::into).collect();

    let export_path = export::export_path(dir, "carbonsight_estimates", format);
    match format {
        ExportFormat::Csv => csv_export::write_estimates_csv(&rows, &export_path)?,
        ExportFormat::Json => {
            json_export::write_estimates_json(&rows, Some(prompt.chars().count()), &export_path)?
        }
    }

    tracing::info!("Exported {} estimates to {}", rows.len(), export_path.display());

    Ok(export_path.to_string_lossy().to_string())
}

/// Export current team averages. Returns the file path of the exported file.
pub fn export_team_averages(
    state: &AppState,
    format: &str,
    dir: Option<PathBuf>,
) -> Result<String, CommandError> {
    let format = format.parse::<ExportFormat>()?;
    let rows: Vec<ExportableTeamAverage> =
        get_team_averages(state)?.iter().map(Into::into).collect();

    let export_path = export::export_path(dir, "carbonsight_teams", format);
    match format {
        ExportFormat::Csv => csv_export::write_team_averages_csv(&rows, &export_path)?,
        ExportFormat::Json => json_export::write_team_averages_json(&rows, &export_path)?,
    }

    tracing::info!("Exported team averages to {}", export_path.display());

    Ok(export_path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::coefficients::default_table;
    use crate::models::metrics::UserMetricTotals;
    use crate::provider::{Completion, ProviderError};
    use async_trait::async_trait;

    fn state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        AppState::new(Some(db), default_table().clone(), AppConfig::default())
    }

    fn seed_user(state: &AppState, user: &str, team: &str, co2: f64, cost: f64, latency: f64) {
        state
            .db()
            .unwrap()
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO user_profiles (user_id, team_id) VALUES (?1, ?2)",
                    rusqlite::params![user, team],
                )?;
                db::queries::upsert_user_totals(conn, &UserMetricTotals::new(user, co2, cost, latency))
            })
            .unwrap();
    }

    struct FakeProvider;

    #[async_trait]
    impl ChatProvider for FakeProvider {
        async fn generate(&self, model: &str, _prompt: &str) -> Result<Completion, ProviderError> {
            Ok(Completion {
                model: model.to_string(),
                text: "Forty-two.".to_string(),
                input_tokens: 400,
                output_tokens: 600,
            })
        }
    }

    struct DownProvider;

    #[async_trait]
    impl ChatProvider for DownProvider {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<Completion, ProviderError> {
            Err(ProviderError::Status {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_aggregate_cache_ttl_and_invalidate() {
        let mut cache = AggregateCache::new(Duration::from_secs(60));
        assert_eq!(cache.get(), None);

        cache.set(vec![1, 2]);
        assert_eq!(cache.get(), Some(vec![1, 2]));

        cache.invalidate();
        assert_eq!(cache.get(), None);

        let mut expired = AggregateCache::new(Duration::ZERO);
        expired.set(1);
        assert_eq!(expired.get(), None);
    }

    #[test]
    fn test_estimate_hello_world() {
        let rows = estimate(&state(), "Hello world").unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].model_id, "gemini-2.0-flash");
        assert_eq!(rows[0].tokens, 3);
        assert_eq!(rows[0].cost, 0.0);
        assert_eq!(rows[0].co2, 0.001);
        assert_eq!(rows[0].latency_ms, 1024.28);
    }

    #[test]
    fn test_team_averages_from_view() {
        let state = state();
        seed_user(&state, "a", "Engineering", 2.0, 1.0, 100.0);
        seed_user(&state, "b", "Engineering", 4.0, 3.0, 300.0);

        let rows = get_team_averages(&state).unwrap();
        let order: Vec<Team> = rows.iter().map(|r| r.team).collect();
        assert_eq!(order, Team::ALL.to_vec());

        let eng = &rows[1];
        assert_eq!(eng.count, 2);
        assert_eq!(eng.avg_co2, 3.0);
        assert_eq!(eng.avg_cost, 2.0);
        assert_eq!(eng.avg_latency, 200.0);

        for row in rows.iter().filter(|r| r.team != Team::Engineering) {
            assert_eq!(*row, TeamAverages::empty(row.team));
        }
    }

    #[test]
    fn test_team_averages_fall_back_without_view() {
        let state = state();
        seed_user(&state, "a", "ML", 1.0, 0.5, 150.0);
        seed_user(&state, "b", "ml", 2.0, 0.25, 250.0);
        seed_user(&state, "c", "Sales", 9.0, 9.0, 900.0);
        // Rounding midpoints: co2 0.00035, cost 0.01535, latency 100.5
        seed_user(&state, "d", "Finance", 0.0005, 0.0153, 100.0);
        seed_user(&state, "e", "Finance", 0.0002, 0.0154, 101.0);
        seed_user(&state, "f", "HR\t", 0.0107, 0.02, 3.0);
        seed_user(&state, "g", "\nhr", 0.0153, 0.0154, 4.0);

        let from_view = get_team_averages(&state).unwrap();

        state
            .db()
            .unwrap()
            .with_connection(|conn| Ok(conn.execute_batch("DROP VIEW team_averages")?))
            .unwrap();
        let fallback = refresh_team_averages(&state).unwrap();

        assert_eq!(from_view, fallback);
        assert_eq!(fallback[0].count, 2);
        assert_eq!(fallback[0].avg_co2, 1.5);
        assert_eq!(fallback[0].avg_cost, 0.375);
        assert_eq!(fallback[0].avg_latency, 200.0);
        assert_eq!(fallback[2].count, 2);
        assert_eq!(fallback[2].avg_latency, 101.0);
        assert_eq!(fallback[4].count, 2);
    }

    #[test]
    fn test_team_averages_without_database() {
        let state = AppState::new(None, default_table().clone(), AppConfig::default());
        assert!(matches!(get_team_averages(&state), Err(CommandError::NotInitialized)));
    }

    #[test]
    fn test_cache_serves_until_invalidated() {
        let state = state();
        seed_user(&state, "a", "Finance", 1.0, 1.0, 10.0);
        assert_eq!(get_team_averages(&state).unwrap()[2].count, 1);

        // Direct writes bypass the command layer, so the cache is stale
        seed_user(&state, "b", "Finance", 3.0, 3.0, 30.0);
        assert_eq!(get_team_averages(&state).unwrap()[2].count, 1);

        set_user_team(&state, "c", None, "Finance").unwrap();
        let rows = get_team_averages(&state).unwrap();
        assert_eq!(rows[2].count, 2);
        assert_eq!(rows[2].avg_co2, 2.0);
    }

    #[test]
    fn test_set_user_team_rejects_unknown_team() {
        let state = state();
        assert!(matches!(
            set_user_team(&state, "a", None, "Marketing"),
            Err(CommandError::Team(_))
        ));
    }

    #[test]
    fn test_recompute_on_change() {
        let state = state();
        let rx = state.db().unwrap().subscribe();

        assert!(recompute_on_change(&state, &rx).unwrap().is_none());

        seed_user(&state, "a", "Research", 4.0, 0.4, 40.0);
        let rows = recompute_on_change(&state, &rx).unwrap().unwrap();
        assert_eq!(rows[3].count, 1);
        assert_eq!(rows[3].avg_co2, 4.0);

        // Request log writes alone do not trigger recomputation
        state
            .db()
            .unwrap()
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO ai_requests (user_id, model_id, created_at) VALUES ('a', 'gpt-4o', '2026-01-01T00:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        assert!(recompute_on_change(&state, &rx).unwrap().is_none());
    }

    #[test]
    fn test_record_usage_updates_totals() {
        let state = state();
        set_user_team(&state, "u1", Some("u1@example.com"), "HR").unwrap();

        let input = UsageInput {
            user_id: "u1",
            model_id: "gpt-4o",
            prompt: "What is the carbon cost of this question?",
            response: "Very small.",
            input_tokens: 500,
            output_tokens: 500,
            latency_ms: 800,
        };
        let report = record_usage(&state, &input).unwrap();
        record_usage(&state, &input).unwrap();

        assert!(report.request_id > 0);
        assert!((report.co2 - 0.45).abs() < 1e-9);
        assert!((report.metrics.cost - 0.005).abs() < 1e-9);

        let totals = state
            .db()
            .unwrap()
            .with_connection(|conn| db::queries::get_user_totals(conn, "u1"))
            .unwrap()
            .unwrap();
        assert!((totals.total_co2 - 0.9).abs() < 1e-9);
        assert!((totals.total_cost - 0.01).abs() < 1e-9);
        assert_eq!(totals.total_latency, 1600.0);

        let hr = &get_team_averages(&state).unwrap()[4];
        assert_eq!(hr.count, 1);
        assert_eq!(hr.avg_co2, 0.9);
        assert_eq!(hr.avg_latency, 1600.0);
    }

    #[test]
    fn test_record_usage_unknown_model() {
        let state = state();
        let input = UsageInput {
            user_id: "u1",
            model_id: "no-such-model",
            prompt: "p",
            response: "r",
            input_tokens: 1,
            output_tokens: 1,
            latency_ms: 1,
        };
        assert!(matches!(
            record_usage(&state, &input),
            Err(CommandError::UnknownModel(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_records_actual_tokens() {
        let state = state();
        let response = chat(&state, &FakeProvider, "u1", None, "Meaning of life?")
            .await
            .unwrap();

        assert_eq!(response.text, "Forty-two.");
        assert_eq!(response.usage.metrics.model_id, "gemini-2.0-flash");
        assert_eq!(response.usage.metrics.input_tokens, 400);
        assert!((response.usage.co2 - 0.3285).abs() < 1e-9);
        assert!((response.usage.metrics.cost - 0.0037).abs() < 1e-9);

        let summary = get_performance_summary(&state, Some(1), None).unwrap().unwrap();
        assert_eq!(summary.total_requests, 1);
    }

    #[tokio::test]
    async fn test_chat_errors_do_not_record() {
        let state = state();

        let err = chat(&state, &DownProvider, "u1", Some("gpt-4o"), "hi").await;
        assert!(matches!(err, Err(CommandError::Provider(_))));

        let err = chat(&state, &FakeProvider, "u1", Some("unknown"), "hi").await;
        assert!(matches!(err, Err(CommandError::UnknownModel(_))));

        let err = chat(&state, &FakeProvider, "u1", None, "   ").await;
        assert!(matches!(err, Err(CommandError::InvalidInput(_))));

        assert!(get_performance_summary(&state, None, None).unwrap().is_none());
    }

    #[test]
    fn test_model_comparison() {
        let state = state();
        for (model, latency) in [("gpt-4o", 1500), ("gpt-3.5-turbo", 600)] {
            record_usage(
                &state,
                &UsageInput {
                    user_id: "u1",
                    model_id: model,
                    prompt: "Summarize this paragraph.",
                    response: "A summary.",
                    input_tokens: 100,
                    output_tokens: 100,
                    latency_ms: latency,
                },
            )
            .unwrap();
        }

        let comparison = get_model_comparison(&state, Some(24)).unwrap().unwrap();
        assert_eq!(comparison.models.len(), 2);
        assert_eq!(comparison.fastest_model, "gpt-3.5-turbo");
        assert_eq!(comparison.most_cost_effective_model, "gpt-3.5-turbo");

        let only_4o = get_performance_summary(&state, None, Some("gpt-4o")).unwrap().unwrap();
        assert_eq!(only_4o.total_requests, 1);
    }

    #[test]
    fn test_efficiency_recommendations_command() {
        let state = state();
        for (model, latency) in [("gpt-4o", 1500), ("gpt-3.5-turbo", 600)] {
            record_usage(
                &state,
                &UsageInput {
                    user_id: "u1",
                    model_id: model,
                    prompt: "Summarize this paragraph.",
                    response: "A summary.",
                    input_tokens: 100,
                    output_tokens: 100,
                    latency_ms: latency,
                },
            )
            .unwrap();
        }

        let recs = get_efficiency_recommendations(&state, "gpt-4o", Some(24))
            .unwrap()
            .unwrap();
        assert_eq!(recs.current.request_count, 1);
        assert_eq!(recs.alternatives.len(), 1);
        assert_eq!(recs.alternatives[0].model_id, "gpt-3.5-turbo");
        assert!(recs.alternatives[0].cost_difference < 0.0);
        assert_eq!(recs.alternatives[0].latency_difference, -900.0);
        assert!(recs.recommendation.is_some());

        let best = get_efficiency_recommendations(&state, "gpt-3.5-turbo", None)
            .unwrap()
            .unwrap();
        assert!(best.alternatives.is_empty());

        assert!(get_efficiency_recommendations(&state, "gemini-1.5-pro", None)
            .unwrap()
            .is_none());
        assert!(matches!(
            get_efficiency_recommendations(&state, "gpt-9", None),
            Err(CommandError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_record_usage_rejects_out_of_range_counts() {
        let state = state();
        let input = UsageInput {
            user_id: "u1",
            model_id: "gpt-4o",
            prompt: "p",
            response: "r",
            input_tokens: u64::MAX,
            output_tokens: 1,
            latency_ms: 1,
        };
        assert!(matches!(record_usage(&state, &input), Err(CommandError::InvalidInput(_))));

        let too_big_for_sql = UsageInput {
            input_tokens: i64::MAX as u64 + 1,
            output_tokens: 0,
            ..input.clone()
        };
        assert!(matches!(
            record_usage(&state, &too_big_for_sql),
            Err(CommandError::InvalidInput(_))
        ));

        let slow = UsageInput {
            input_tokens: 1,
            latency_ms: u64::MAX,
            ..input
        };
        assert!(matches!(record_usage(&state, &slow), Err(CommandError::InvalidInput(_))));

        assert!(get_performance_summary(&state, None, None).unwrap().is_none());
        let totals = state
            .db()
            .unwrap()
            .with_connection(|conn| db::queries::get_user_totals(conn, "u1"))
            .unwrap();
        assert!(totals.is_none());
    }

    #[test]
    fn test_compare_models_command() {
        let state = state();
        let savings = compare_models(&state, "gemini-1.5-pro", "gemini-1.5-flash", 1000).unwrap();
        assert!((savings.co2_saved - 0.43).abs() < 1e-9);

        assert!(matches!(
            compare_models(&state, "gpt-4o", "missing", 10),
            Err(CommandError::UnknownModel(m)) if m == "missing"
        ));
    }

    #[test]
    fn test_export_commands() {
        let state = state();
        let dir = std::env::temp_dir().join(format!("carbonsight_cmd_export_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv_path = export_estimates(&state, "Hello world", "csv", Some(dir.clone())).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 6);

        let json_path = export_team_averages(&state, "json", Some(dir.clone())).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["teams"].as_array().unwrap().len(), 5);

        assert!(export_team_averages(&state, "xml", Some(dir.clone())).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
