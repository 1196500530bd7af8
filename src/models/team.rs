//! Team enumeration and membership parsing
//!
//! The set of teams is closed. Membership values read from the store that
//! fall outside it are reported back as warnings instead of being dropped
//! silently.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Team errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TeamError {
    #[error("Unknown team: {0}")]
    Unknown(String),
}

/// Padding ignored around stored team values. Must match the `TRIM` in the
/// `team_averages` view.
pub const TEAM_PADDING: [char; 4] = [' ', '\t', '\n', '\r'];

/// A team in the fixed organization enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    #[serde(rename = "ML")]
    Ml,
    Engineering,
    Finance,
    Research,
    #[serde(rename = "HR")]
    Hr,
}

impl Team {
    /// All teams, in reporting order
    pub const ALL: [Team; 5] = [
        Team::Ml,
        Team::Engineering,
        Team::Finance,
        Team::Research,
        Team::Hr,
    ];

    /// Canonical identifier as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Ml => "ML",
            Team::Engineering => "Engineering",
            Team::Finance => "Finance",
            Team::Research => "Research",
            Team::Hr => "HR",
        }
    }

    /// Position in the enumeration
    pub fn ordinal(&self) -> usize {
        match self {
            Team::Ml => 0,
            Team::Engineering => 1,
            Team::Finance => 2,
            Team::Research => 3,
            Team::Hr => 4,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = TeamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_matches(&TEAM_PADDING[..]).to_ascii_lowercase().as_str() {
            "ml" => Ok(Team::Ml),
            "engineering" => Ok(Team::Engineering),
            "finance" => Ok(Team::Finance),
            "research" => Ok(Team::Research),
            "hr" => Ok(Team::Hr),
            _ => Err(TeamError::Unknown(s.to_string())),
        }
    }
}

/// A membership row whose team value is not part of the enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipWarning {
    pub user_id: String,
    pub value: String,
}

/// Parsed user -> team mapping
#[derive(Debug, Clone, Default)]
pub struct Memberships {
    pub map: HashMap<String, Team>,
    pub warnings: Vec<MembershipWarning>,
}

/// Parse raw (user_id, team value) pairs into a membership map
pub fn parse_memberships<I, U, T>(pairs: I) -> Memberships
where
    I: IntoIterator<Item = (U, T)>,
    U: Into<String>,
    T: AsRef<str>,
{
    let mut memberships = Memberships::default();

    for (user_id, value) in pairs {
        let user_id = user_id.into();
        match value.as_ref().parse::<Team>() {
            Ok(team) => {
                memberships.map.insert(user_id, team);
            }
            Err(_) => memberships.warnings.push(MembershipWarning {
                user_id,
                value: value.as_ref().to_string(),
            }),
        }
    }

    memberships
}
