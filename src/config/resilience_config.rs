//! Resilience configuration: circuit breakers, deadlines, rate limiting and
//! request concurrency.

use super::{parse_env, parse_env_min};
use crate::infrastructure::core::circuit_breaker::CircuitBreakerConfig;
use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ResilienceEnvConfig {
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout_secs: u64,
    pub breaker_half_open_max_calls: u32,
    /// Deadline for a single estimator fit or predict on the blocking pool
    pub estimator_timeout_ms: u64,
    pub rate_limit_cooldown_ms: u64,
    pub rate_limit_marker_ttl_secs: u64,
    pub worker_pool_size: usize,
}

impl Default for ResilienceEnvConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 5,
            breaker_reset_timeout_secs: 60,
            breaker_half_open_max_calls: 3,
            estimator_timeout_ms: 30_000,
            rate_limit_cooldown_ms: 5_000,
            rate_limit_marker_ttl_secs: 300,
            worker_pool_size: 2,
        }
    }
}

impl ResilienceEnvConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            breaker_failure_threshold: parse_env_min(
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                d.breaker_failure_threshold,
                1,
            )?,
            breaker_reset_timeout_secs: parse_env(
                "CIRCUIT_BREAKER_RESET_TIMEOUT_SECS",
                d.breaker_reset_timeout_secs,
            )?,
            breaker_half_open_max_calls: parse_env_min(
                "CIRCUIT_BREAKER_HALF_OPEN_MAX_CALLS",
                d.breaker_half_open_max_calls,
                1,
            )?,
            estimator_timeout_ms: parse_env_min("ESTIMATOR_TIMEOUT_MS", d.estimator_timeout_ms, 1)?,
            rate_limit_cooldown_ms: parse_env("RATE_LIMIT_COOLDOWN_MS", d.rate_limit_cooldown_ms)?,
            rate_limit_marker_ttl_secs: parse_env(
                "RATE_LIMIT_MARKER_TTL_SECS",
                d.rate_limit_marker_ttl_secs,
            )?,
            worker_pool_size: parse_env_min("WORKER_POOL_SIZE", d.worker_pool_size, 1)?,
        })
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(
            self.breaker_failure_threshold,
            Duration::from_secs(self.breaker_reset_timeout_secs),
            self.breaker_half_open_max_calls,
        )
    }

    pub fn estimator_timeout(&self) -> Duration {
        Duration::from_millis(self.estimator_timeout_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn rate_limit_marker_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_limit_marker_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resilience_defaults() {
        let config = ResilienceEnvConfig::default();
        assert_eq!(config.worker_pool_size, 2);
        let breaker = config.breaker_config();
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(60));
        assert_eq!(breaker.half_open_max_calls, 3);
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(5));
    }
}
