//! Database schema definitions
//!
//! Contains SQL for creating all tables, indexes, and views

use rusqlite::{params, Connection};

use super::DbError;
use crate::models::team::Team;

/// SQL schema for all tables
const SCHEMA: &str = r#"
-- Closed team enumeration, ordered for reporting
CREATE TABLE IF NOT EXISTS teams (
    team_id TEXT PRIMARY KEY,
    ordinal INTEGER NOT NULL UNIQUE
);

-- User profile and team membership
CREATE TABLE IF NOT EXISTS user_profiles (
    user_id TEXT PRIMARY KEY,
    email TEXT,
    team_id TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_user_profiles_team ON user_profiles(team_id);

-- Cumulative per-user metrics
CREATE TABLE IF NOT EXISTS user_metrics (
    user_id TEXT PRIMARY KEY,
    total_co2 REAL NOT NULL DEFAULT 0.0,
    total_cost REAL NOT NULL DEFAULT 0.0,
    total_latency REAL NOT NULL DEFAULT 0.0,
    updated_at TEXT NOT NULL
);

-- Request log
CREATE TABLE IF NOT EXISTS ai_requests (
    request_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    model_id TEXT NOT NULL,
    prompt_chars INTEGER NOT NULL DEFAULT 0,
    response_chars INTEGER NOT NULL DEFAULT 0,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cost REAL NOT NULL DEFAULT 0.0,
    co2 REAL NOT NULL DEFAULT 0.0,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    efficiency_score REAL NOT NULL DEFAULT 0.0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ai_requests_time ON ai_requests(created_at);
CREATE INDEX IF NOT EXISTS idx_ai_requests_model ON ai_requests(model_id);

-- Per-team member counts and metric sums. Averaging and rounding happen in
-- metrics::aggregate::TeamSums so the client-side fallback matches exactly.
-- Team values are matched ignoring ASCII case and space, tab, CR, LF padding,
-- the same normalization as Team::from_str. Recreated on every start so an
-- older definition never lingers.
DROP VIEW IF EXISTS team_averages;
CREATE VIEW team_averages AS
SELECT
    t.team_id AS team_id,
    t.ordinal AS ordinal,
    COUNT(m.user_id) AS entry_count,
    COALESCE(SUM(m.total_co2), 0.0) AS sum_co2,
    COALESCE(SUM(m.total_cost), 0.0) AS sum_cost,
    COALESCE(SUM(m.total_latency), 0.0) AS sum_latency
FROM teams t
LEFT JOIN user_profiles p
    ON LOWER(TRIM(p.team_id, ' ' || char(9) || char(10) || char(13))) = LOWER(t.team_id)
LEFT JOIN user_metrics m ON m.user_id = p.user_id
GROUP BY t.team_id, t.ordinal;
"#;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Insert the team enumeration
pub fn seed_teams(conn: &Connection) -> Result<(), DbError> {
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO teams (team_id, ordinal) VALUES (?1, ?2)")?;
    for team in Team::ALL {
        stmt.execute(params![team.as_str(), team.ordinal() as i64])?;
    }
    Ok(())
}
