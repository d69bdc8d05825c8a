//! Configuration module for propcast.
//!
//! Structured configuration loaded from environment variables (after
//! `dotenvy` has read `.env`), organized by concern: Resilience, Cache,
//! Training, Streaming and Observability. Per-league settings come from an
//! optional TOML file.

mod cache_config;
mod observability_config;
mod resilience_config;
mod streaming_config;
mod training_config;

pub use cache_config::CacheEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use resilience_config::ResilienceEnvConfig;
pub use streaming_config::StreamingEnvConfig;
pub use training_config::TrainingEnvConfig;

use crate::domain::config::LeagueConfig;
use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// SQLite URL for the document store; in-memory store when unset
    pub database_url: Option<String>,
    pub league_config_path: Option<PathBuf>,
    pub leagues: LeagueConfig,
    pub resilience: ResilienceEnvConfig,
    pub cache: CacheEnvConfig,
    pub training: TrainingEnvConfig,
    pub streaming: StreamingEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let league_config_path = env::var("LEAGUE_CONFIG_PATH").ok().map(PathBuf::from);
        let leagues = load_league_config(league_config_path.as_deref())?;

        Ok(Self {
            database_url,
            league_config_path,
            leagues,
            resilience: ResilienceEnvConfig::from_env()
                .context("Failed to load resilience config")?,
            cache: CacheEnvConfig::from_env().context("Failed to load cache config")?,
            training: TrainingEnvConfig::from_env().context("Failed to load training config")?,
            streaming: StreamingEnvConfig::from_env()
                .context("Failed to load streaming config")?,
            observability: ObservabilityEnvConfig::from_env()
                .context("Failed to load observability config")?,
        })
    }
}

/// League defaults, with overrides from `path` when given
pub fn load_league_config(path: Option<&Path>) -> Result<LeagueConfig> {
    let Some(path) = path else {
        return Ok(LeagueConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read league config {:?}", path))?;
    LeagueConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid league config {:?}", path))
}

pub(crate) fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .context(format!("Failed to parse {}", key)),
        Err(_) => Ok(default),
    }
}

/// Like `parse_env`, rejecting values below `min`
pub(crate) fn parse_env_min<T>(key: &str, default: T, min: T) -> Result<T>
where
    T: FromStr + Display + PartialOrd,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_env(key, default)?;
    if value < min {
        anyhow::bail!("{} must be at least {} (got {})", key, min, value);
    }
    Ok(value)
}
