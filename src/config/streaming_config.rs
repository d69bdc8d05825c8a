//! Real-time queue settings.

use super::{parse_env, parse_env_min};
use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StreamingEnvConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval_secs: u64,
}

impl Default for StreamingEnvConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_000,
            batch_size: 50,
            flush_interval_secs: 10,
        }
    }
}

impl StreamingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            queue_capacity: parse_env_min("STREAM_QUEUE_CAPACITY", d.queue_capacity, 1)?,
            batch_size: parse_env_min("STREAM_BATCH_SIZE", d.batch_size, 1)?,
            flush_interval_secs: parse_env("STREAM_FLUSH_INTERVAL_SECS", d.flush_interval_secs)?,
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}
