//! Push-based metrics reporter
//!
//! Periodically emits a structured JSON snapshot through the log. Stdout is
//! reserved for prediction responses, so nothing is printed directly.

use crate::infrastructure::core::circuit_breaker::CircuitBreakerStatus;
use crate::infrastructure::core::circuit_breaker_registry::CircuitBreakerRegistry;
use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub memory_rss_bytes: f64,
    pub housekeeping_runs: u64,
    pub circuit_breakers: BTreeMap<String, CircuitBreakerStatus>,
}

/// Outputs metrics as structured JSON logs on a fixed interval
pub struct MetricsReporter {
    breakers: Arc<CircuitBreakerRegistry>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>, metrics: Metrics, interval: Duration) -> Self {
        Self {
            breakers,
            metrics,
            start_time: Instant::now(),
            interval,
        }
    }

    /// Run until the shutdown channel flips to `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("MetricsReporter: Shutting down");
                        return;
                    }
                    continue;
                }
            }

            let snapshot = self.collect_snapshot().await;
            match serde_json::to_string(&snapshot) {
                // Special prefix so log pipelines can filter these lines
                Ok(json) => info!("METRICS_JSON:{}", json),
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            }
        }
    }

    /// Collect current metrics snapshot
    pub async fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            memory_rss_bytes: self.metrics.memory_rss_bytes.get(),
            housekeeping_runs: self.metrics.housekeeping_runs_total.get(),
            circuit_breakers: self.breakers.get_all_statuses().await,
        }
    }
}
