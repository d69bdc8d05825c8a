//! Cache tier sizing and lifetimes.

use super::{parse_env, parse_env_min};
use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheEnvConfig {
    pub prediction_cache_capacity: usize,
    pub prediction_cache_ttl_secs: u64,
    pub model_cache_capacity: usize,
    pub model_cache_ttl_secs: u64,
    pub file_cache_dir: PathBuf,
    pub file_cache_ttl_secs: u64,
}

impl Default for CacheEnvConfig {
    fn default() -> Self {
        Self {
            prediction_cache_capacity: 1_000,
            prediction_cache_ttl_secs: 300,
            model_cache_capacity: 16,
            model_cache_ttl_secs: 24 * 3600,
            file_cache_dir: PathBuf::from("cache/heuristic"),
            file_cache_ttl_secs: 3600,
        }
    }
}

impl CacheEnvConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            prediction_cache_capacity: parse_env_min(
                "PREDICTION_CACHE_CAPACITY",
                d.prediction_cache_capacity,
                1,
            )?,
            prediction_cache_ttl_secs: parse_env(
                "PREDICTION_CACHE_TTL_SECS",
                d.prediction_cache_ttl_secs,
            )?,
            model_cache_capacity: parse_env_min("MODEL_CACHE_CAPACITY", d.model_cache_capacity, 1)?,
            model_cache_ttl_secs: parse_env("MODEL_CACHE_TTL_SECS", d.model_cache_ttl_secs)?,
            file_cache_dir: env::var("FILE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.file_cache_dir),
            file_cache_ttl_secs: parse_env("FILE_CACHE_TTL_SECS", d.file_cache_ttl_secs)?,
        })
    }

    pub fn prediction_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.prediction_cache_ttl_secs)
    }

    pub fn model_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.model_cache_ttl_secs)
    }

    pub fn file_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.file_cache_ttl_secs)
    }
}
