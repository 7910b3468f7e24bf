//! Runtime configuration
//!
//! Read from the environment (after loading `.env` when present).

use crate::error::BotError;
use crate::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Postgres URL; in-memory stores are used when absent
    pub database_url: Option<String>,
    pub api_port: u16,
    pub telegram_token: Option<String>,
    /// Bound on every individual store call
    pub store_timeout: Duration,
    /// Long-poll timeout handed to the chat API
    pub poll_timeout: Duration,
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            api_port: 8080,
            telegram_token: None,
            store_timeout: Duration::from_secs(55),
            poll_timeout: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; the first set key of each group wins
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .find(|value| !value.trim().is_empty())
        };
        let defaults = Self::default();

        let api_port = match first(&["PORT", "API_PORT"]) {
            Some(value) => parse_number::<u16>("PORT", &value)?,
            None => defaults.api_port,
        };
        let store_timeout = match first(&["STORE_TIMEOUT_SECS"]) {
            Some(value) => Duration::from_secs(parse_number("STORE_TIMEOUT_SECS", &value)?),
            None => defaults.store_timeout,
        };
        let poll_timeout = match first(&["POLL_TIMEOUT_SECS"]) {
            Some(value) => Duration::from_secs(parse_number("POLL_TIMEOUT_SECS", &value)?),
            None => defaults.poll_timeout,
        };

        Ok(Self {
            database_url: first(&["POSTGRES_URL", "DATABASE_URL"]),
            api_port,
            telegram_token: first(&["TELEGRAM_TOKEN", "API_TOKEN"]),
            store_timeout,
            poll_timeout,
            log_level: first(&["LOG_LEVEL"]).unwrap_or(defaults.log_level),
        })
    }

    pub fn require_telegram_token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .ok_or_else(|| BotError::ConfigError("No API token was supplied".to_string()))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BotError::ConfigError(format!("{} must be a number, got \"{}\"", key, value)))
}
