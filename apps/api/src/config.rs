use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_CRITIQUE_TIMEOUT_MS: u64 = 8000;

/// Application configuration loaded from environment variables.
/// Nothing is required; without `ANTHROPIC_API_KEY` the critique service is off.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Upper bound for any single critique call, in milliseconds.
    pub critique_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            critique_timeout_ms: match optional_env("CRITIQUE_TIMEOUT_MS") {
                Some(raw) => raw
                    .parse::<u64>()
                    .with_context(|| format!("CRITIQUE_TIMEOUT_MS must be milliseconds, got '{raw}'"))?,
                None => DEFAULT_CRITIQUE_TIMEOUT_MS,
            },
        })
    }

    pub fn critique_timeout(&self) -> Duration {
        Duration::from_millis(self.critique_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            port: 8080,
            rust_log: "info".to_string(),
            critique_timeout_ms: DEFAULT_CRITIQUE_TIMEOUT_MS,
        }
    }
}

/// Unset and blank variables both read as `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
