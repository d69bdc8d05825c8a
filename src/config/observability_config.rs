//! Observability configuration parsing from environment variables.
//!
//! This module handles the metrics reporter and memory monitor cadence.

use super::parse_env;
use anyhow::Result;
use std::env;
use std::time::Duration;

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    pub report_interval_secs: u64,
    pub memory_check_interval_secs: u64,
    pub memory_threshold_mb: u64,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval_secs: 60,
            memory_check_interval_secs: 300,
            memory_threshold_mb: 1024,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            enabled: env::var("OBSERVABILITY_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
            report_interval_secs: parse_env("METRICS_REPORT_INTERVAL_SECS", d.report_interval_secs)?
                .max(1),
            memory_check_interval_secs: parse_env(
                "MEMORY_CHECK_INTERVAL_SECS",
                d.memory_check_interval_secs,
            )?
            .max(1),
            memory_threshold_mb: parse_env("MEMORY_THRESHOLD_MB", d.memory_threshold_mb)?,
        })
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn memory_check_interval(&self) -> Duration {
        Duration::from_secs(self.memory_check_interval_secs)
    }

    pub fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mb.saturating_mul(1024 * 1024)
    }
}
