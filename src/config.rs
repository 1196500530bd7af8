//! Application configuration
//!
//! Loaded once at start-up from a `.env` file and the process environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::db::default_db_path;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Coefficient JSON file; the built-in table is used when unset
    pub coefficients_path: Option<PathBuf>,
    pub log_level: Level,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub default_model: String,
    pub cache_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            coefficients_path: None,
            log_level: Level::INFO,
            gemini_api_key: String::new(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_level = match get("CARBONSIGHT_LOG") {
            Some(value) => value.trim().parse::<Level>().map_err(|_| ConfigError::Invalid {
                key: "CARBONSIGHT_LOG",
                expected: "one of trace, debug, info, warn, error",
                value,
            })?,
            None => defaults.log_level,
        };

        let cache_ttl = match get("CARBONSIGHT_CACHE_TTL_SECS") {
            Some(value) => Duration::from_secs(value.trim().parse().map_err(|_| {
                ConfigError::Invalid {
                    key: "CARBONSIGHT_CACHE_TTL_SECS",
                    expected: "a whole number of seconds",
                    value,
                }
            })?),
            None => defaults.cache_ttl,
        };

        Ok(Self {
            db_path: get("CARBONSIGHT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            coefficients_path: get("CARBONSIGHT_COEFFICIENTS").map(PathBuf::from),
            log_level,
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            default_model: get("CARBONSIGHT_DEFAULT_MODEL").unwrap_or(defaults.default_model),
            cache_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert!(config.coefficients_path.is_none());
        assert!(config.gemini_api_key.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CARBONSIGHT_DB_PATH", "/tmp/cs.db"),
            ("CARBONSIGHT_COEFFICIENTS", "/tmp/coeffs.json"),
            ("CARBONSIGHT_LOG", "debug"),
            ("CARBONSIGHT_CACHE_TTL_SECS", "5"),
            ("CARBONSIGHT_DEFAULT_MODEL", "gpt-4o"),
            ("GEMINI_API_KEY", "k"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/cs.db"));
        assert_eq!(config.coefficients_path, Some(PathBuf::from("/tmp/coeffs.json")));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.gemini_api_key, "k");
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("CARBONSIGHT_DEFAULT_MODEL", "  ")])).unwrap();
        assert_eq!(config.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(AppConfig::from_lookup(lookup(&[("CARBONSIGHT_CACHE_TTL_SECS", "soon")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("CARBONSIGHT_LOG", "loud")])).is_err());
    }
}
