//! Database query implementations
//!
//! Contains functions for user totals, team membership, team averages, and
//! the request log

use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DbError;
use crate::metrics::TeamSums;
use crate::models::metrics::{
    now_timestamp, MetricDelta, RequestRecord, TeamAverages, UserMetricTotals,
};
use crate::models::team::Team;

fn totals_from_row(row: &Row<'_>) -> rusqlite::Result<UserMetricTotals> {
    Ok(UserMetricTotals {
        user_id: row.get(0)?,
        total_co2: row.get(1)?,
        total_cost: row.get(2)?,
        total_latency: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Get every user's cumulative totals.
///
/// Fails with `InvalidRow` if any stored total is negative or not finite.
pub fn get_all_user_totals(conn: &Connection) -> Result<Vec<UserMetricTotals>, DbError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT user_id, total_co2, total_cost, total_latency, updated_at
        FROM user_metrics
        ORDER BY user_id
        "#,
    )?;

    let totals = stmt
        .query_map([], totals_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for row in &totals {
        row.validate().map_err(DbError::InvalidRow)?;
    }

    Ok(totals)
}

/// Get a single user's totals
pub fn get_user_totals(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<UserMetricTotals>, DbError> {
    let totals = conn
        .query_row(
            r#"
            SELECT user_id, total_co2, total_cost, total_latency, updated_at
            FROM user_metrics
            WHERE user_id = ?1
            "#,
            params![user_id],
            totals_from_row,
        )
        .optional()?;

    Ok(totals)
}

/// Insert or replace a user's totals with absolute values
pub fn upsert_user_totals(conn: &Connection, totals: &UserMetricTotals) -> Result<(), DbError> {
    totals.validate().map_err(DbError::InvalidRow)?;

    conn.execute(
        r#"
        INSERT INTO user_metrics (user_id, total_co2, total_cost, total_latency, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(user_id) DO UPDATE SET
            total_co2 = excluded.total_co2,
            total_cost = excluded.total_cost,
            total_latency = excluded.total_latency,
            updated_at = excluded.updated_at
        "#,
        params![
            totals.user_id,
            totals.total_co2,
            totals.total_cost,
            totals.total_latency,
            totals.updated_at,
        ],
    )?;

    Ok(())
}

/// Add a request's metrics to a user's totals, creating the row if needed
pub fn add_user_delta(conn: &Connection, user_id: &str, delta: &MetricDelta) -> Result<(), DbError> {
    let fields = [("co2", delta.co2), ("cost", delta.cost), ("latency", delta.latency)];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(DbError::InvalidRow(format!(
                "user {}: {} delta must be finite and non-negative, got {}",
                user_id, name, value
            )));
        }
    }

    conn.execute(
        r#"
        INSERT INTO user_metrics (user_id, total_co2, total_cost, total_latency, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(user_id) DO UPDATE SET
            total_co2 = total_co2 + excluded.total_co2,
            total_cost = total_cost + excluded.total_cost,
            total_latency = total_latency + excluded.total_latency,
            updated_at = excluded.updated_at
        "#,
        params![user_id, delta.co2, delta.cost, delta.latency, now_timestamp()],
    )?;

    Ok(())
}

/// Get raw (user_id, team value) pairs for every user with a team set
pub fn get_team_memberships(conn: &Connection) -> Result<Vec<(String, String)>, DbError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT user_id, team_id
        FROM user_profiles
        WHERE team_id IS NOT NULL
        ORDER BY user_id
        "#,
    )?;

    let pairs = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pairs)
}

/// Create or update a user profile.
///
/// `None` fields keep their stored value.
pub fn upsert_user_profile(
    conn: &Connection,
    user_id: &str,
    email: Option<&str>,
    team: Option<Team>,
) -> Result<(), DbError> {
    let now = now_timestamp();

    conn.execute(
        r#"
        INSERT INTO user_profiles (user_id, email, team_id, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(user_id) DO UPDATE SET
            email = COALESCE(excluded.email, email),
            team_id = COALESCE(excluded.team_id, team_id),
            updated_at = excluded.updated_at
        "#,
        params![user_id, email, team.map(|t| t.as_str()), now],
    )?;

    Ok(())
}

/// Get a user's team, if set to a known team.
///
/// A stored value outside the enumeration is logged and treated as unset.
pub fn get_user_team(conn: &Connection, user_id: &str) -> Result<Option<Team>, DbError> {
    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT team_id FROM user_profiles WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(value) = value.flatten() else {
        return Ok(None);
    };

    match value.parse::<Team>() {
        Ok(team) => Ok(Some(team)),
        Err(e) => {
            tracing::warn!("User {} has an unusable team value: {}", user_id, e);
            Ok(None)
        }
    }
}

/// Read the `team_averages` view in team order.
///
/// The view supplies member counts and raw sums; averages are finished by
/// [`TeamSums::averages`], the same routine the client-side fallback uses.
pub fn get_team_averages_from_view(conn: &Connection) -> Result<Vec<TeamAverages>, DbError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT team_id, entry_count, sum_co2, sum_cost, sum_latency
        FROM team_averages
        ORDER BY ordinal
        "#,
    )?;

    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                TeamSums {
                    count: row.get(1)?,
                    co2: row.get(2)?,
                    cost: row.get(3)?,
                    latency: row.get(4)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(team_id, sums)| {
            let team = team_id
                .parse::<Team>()
                .map_err(|e| DbError::InvalidRow(e.to_string()))?;
            Ok(sums.averages(team))
        })
        .collect()
}

fn sql_int(field: &str, value: u64) -> Result<i64, DbError> {
    i64::try_from(value)
        .map_err(|_| DbError::InvalidRow(format!("{} out of range: {}", field, value)))
}

/// Append a request to the log, returning its id
pub fn insert_request(conn: &Connection, record: &RequestRecord) -> Result<i64, DbError> {
    let prompt_chars = sql_int("prompt_chars", record.prompt_chars)?;
    let response_chars = sql_int("response_chars", record.response_chars)?;
    let input_tokens = sql_int("input_tokens", record.input_tokens)?;
    let output_tokens = sql_int("output_tokens", record.output_tokens)?;
    let latency_ms = sql_int("latency_ms", record.latency_ms)?;

    conn.execute(
        r#"
        INSERT INTO ai_requests (
            user_id, model_id, prompt_chars, response_chars,
            input_tokens, output_tokens, cost, co2, latency_ms,
            efficiency_score, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            record.user_id,
            record.model_id,
            prompt_chars,
            response_chars,
            input_tokens,
            output_tokens,
            record.cost,
            record.co2,
            latency_ms,
            record.efficiency_score,
            record.created_at,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Get logged requests, optionally limited to the last `hours` hours
pub fn get_recent_requests(
    conn: &Connection,
    hours: Option<u32>,
) -> Result<Vec<RequestRecord>, DbError> {
    let cutoff = match hours {
        Some(h) => (Utc::now() - Duration::hours(h as i64))
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        None => String::new(),
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT user_id, model_id, prompt_chars, response_chars,
               input_tokens, output_tokens, cost, co2, latency_ms,
               efficiency_score, created_at
        FROM ai_requests
        WHERE created_at >= ?1
        ORDER BY created_at, request_id
        "#,
    )?;

    let records = stmt
        .query_map(params![cutoff], |row| {
            Ok(RequestRecord {
                user_id: row.get(0)?,
                model_id: row.get(1)?,
                prompt_chars: row.get::<_, i64>(2)? as u64,
                response_chars: row.get::<_, i64>(3)? as u64,
                input_tokens: row.get::<_, i64>(4)? as u64,
                output_tokens: row.get::<_, i64>(5)? as u64,
                cost: row.get(6)?,
                co2: row.get(7)?,
                latency_ms: row.get::<_, i64>(8)? as u64,
                efficiency_score: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}
