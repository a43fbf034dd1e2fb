use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Per-analysis budget, context acquisition included.
    pub analysis_timeout: Duration,
    /// How long terminal contexts stay queryable before the sweep discards them.
    pub context_retention: chrono::Duration,
    pub context_sweep_interval: Duration,
    /// Off for managed databases that forbid CREATE SCHEMA; every context then shares `public`.
    pub enable_schema_isolation: bool,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            analysis_timeout: Duration::from_millis(parse_env("ANALYSIS_TIMEOUT_MS", 30_000u64)?),
            context_retention: chrono::Duration::hours(parse_env("CONTEXT_RETENTION_HOURS", 24i64)?),
            context_sweep_interval: Duration::from_secs(parse_env(
                "CONTEXT_SWEEP_INTERVAL_SECS",
                3_600u64,
            )?),
            enable_schema_isolation: parse_env("ENABLE_SCHEMA_ISOLATION", true)?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10u32)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an optional variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}
