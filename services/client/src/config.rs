//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use tracing::Level;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base of every backend route; always ends with `/` so joins append.
    pub api_url: Url,
    pub state_path: PathBuf,
    pub request_timeout: Duration,
    pub log_level: Level,
    pub page_size: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend ---
        let api_url_str = lookup("EVALUATOR_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_base_url(&api_url_str).map_err(|e| {
            ConfigError::InvalidValue("EVALUATOR_API_URL".to_string(), e)
        })?;

        let timeout_str = lookup("EVALUATOR_TIMEOUT_SECS").unwrap_or_else(|| "300".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "EVALUATOR_TIMEOUT_SECS".to_string(),
                format!("'{}' is not a number of seconds", timeout_str),
            )
        })?;

        // --- Local state and presentation ---
        let state_path = lookup("EVALUATOR_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.evaluator/session.json"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let page_size_str = lookup("EVALUATOR_PAGE_SIZE").unwrap_or_else(|| "10".to_string());
        let page_size = match page_size_str.parse::<u32>() {
            Ok(size) if size > 0 => size,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "EVALUATOR_PAGE_SIZE".to_string(),
                    format!("'{}' is not a positive page size", page_size_str),
                ))
            }
        };

        Ok(Self {
            api_url,
            state_path,
            request_timeout: Duration::from_secs(timeout_secs),
            log_level,
            page_size,
        })
    }
}

/// Parses a base URL and makes sure it ends with a slash, otherwise
/// `Url::join` would replace its last path segment.
pub fn parse_base_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err(format!("'{}' cannot be used as a base URL", trimmed));
    }
    Ok(url)
}
