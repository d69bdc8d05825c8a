//! Training data volume and cold-start settings.

use super::{parse_env, parse_env_min};
use anyhow::{Result, bail};

#[derive(Debug, Clone)]
pub struct TrainingEnvConfig {
    /// Below this many labelled rows the dataset is topped up with synthetic games
    pub min_training_samples: usize,
    pub max_training_samples: usize,
    pub synthetic_seed: u64,
    /// Recent games consulted for the historical trend insight
    pub trend_window: usize,
}

impl Default for TrainingEnvConfig {
    fn default() -> Self {
        Self {
            min_training_samples: 20,
            max_training_samples: 5_000,
            synthetic_seed: 42,
            trend_window: 20,
        }
    }
}

impl TrainingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let config = Self {
            min_training_samples: parse_env_min(
                "MIN_TRAINING_SAMPLES",
                d.min_training_samples,
                10,
            )?,
            max_training_samples: parse_env("MAX_TRAINING_SAMPLES", d.max_training_samples)?,
            synthetic_seed: parse_env("SYNTHETIC_SEED", d.synthetic_seed)?,
            trend_window: parse_env_min("TREND_WINDOW", d.trend_window, 1)?,
        };
        if config.max_training_samples < config.min_training_samples {
            bail!(
                "MAX_TRAINING_SAMPLES ({}) must be >= MIN_TRAINING_SAMPLES ({})",
                config.max_training_samples,
                config.min_training_samples
            );
        }
        Ok(config)
    }
}
