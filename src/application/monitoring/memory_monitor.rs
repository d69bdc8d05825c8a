use crate::application::prediction::PredictionContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Page size assumed when converting `/proc/self/statm` pages to bytes
const PAGE_SIZE: u64 = 4096;

/// What one housekeeping pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub models_purged: usize,
    pub kv_entries_purged: usize,
    pub predictions_cleared: usize,
}

/// Resident set size of this process. `None` where `/proc` is unavailable.
pub fn read_rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm(&statm)
}

fn parse_statm(content: &str) -> Option<u64> {
    let resident: u64 = content.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident.saturating_mul(PAGE_SIZE))
}

/// Samples memory on an interval and sheds cached state above a threshold.
pub struct MemoryMonitor {
    ctx: Arc<PredictionContext>,
    interval: Duration,
    threshold_bytes: u64,
}

impl MemoryMonitor {
    pub fn new(ctx: Arc<PredictionContext>) -> Self {
        let interval = ctx.config.observability.memory_check_interval();
        let threshold_bytes = ctx.config.observability.memory_threshold_bytes();
        Self {
            ctx,
            interval,
            threshold_bytes,
        }
    }

    pub fn with_threshold(mut self, threshold_bytes: u64) -> Self {
        self.threshold_bytes = threshold_bytes;
        self
    }

    /// Run until the shutdown channel flips to `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "MemoryMonitor: Started (interval: {:?}, threshold: {} bytes)",
            self.interval, self.threshold_bytes
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("MemoryMonitor: Shutting down");
                        return;
                    }
                    continue;
                }
            }

            self.check_once(read_rss_bytes()).await;
        }
    }

    /// Record a sample and run housekeeping when it exceeds the threshold.
    /// Returns the report when housekeeping ran.
    pub async fn check_once(&self, rss_bytes: Option<u64>) -> Option<HousekeepingReport> {
        let rss = match rss_bytes {
            Some(rss) => rss,
            None => {
                debug!("MemoryMonitor: RSS unavailable on this platform");
                return None;
            }
        };
        self.ctx.metrics.memory_rss_bytes.set(rss as f64);

        if rss <= self.threshold_bytes {
            return None;
        }

        warn!(
            "MemoryMonitor: RSS {} bytes above threshold {}, running housekeeping",
            rss, self.threshold_bytes
        );
        let report = self.housekeeping().await;
        self.ctx.metrics.housekeeping_runs_total.inc();
        info!(
            "MemoryMonitor: Housekeeping purged {} models, {} kv entries, {} cached predictions",
            report.models_purged, report.kv_entries_purged, report.predictions_cleared
        );
        Some(report)
    }

    /// Drop expired model handles and KV entries and clear the hot cache
    pub async fn housekeeping(&self) -> HousekeepingReport {
        let models_purged = self.ctx.trainer.purge_expired();
        let kv_entries_purged = match self.ctx.kv.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                warn!("MemoryMonitor: KV purge failed: {}", e);
                0
            }
        };
        let predictions_cleared = self.ctx.cache.len();
        self.ctx.cache.clear();

        HousekeepingReport {
            models_purged,
            kv_entries_purged,
            predictions_cleared,
        }
    }
}
