//! Retraining policy.
//!
//! A league needs (re)training when it was never trained, when training is
//! forced, when its interval has elapsed, or when the latest holdout accuracy
//! dropped below the league's threshold.

use crate::domain::config::LeagueConfig;
use crate::domain::league::League;
use crate::domain::ml::{PerformanceHistory, PerformanceMetrics};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, error};

/// Why a league is due for training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingReason {
    NeverTrained,
    Forced,
    IntervalElapsed,
    BelowThreshold,
}

/// Training history of one league
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRecord {
    pub last_trained_at: DateTime<Utc>,
    pub version: String,
    pub recent_performance: PerformanceHistory,
}

pub struct TrainingScheduler {
    leagues: LeagueConfig,
    records: RwLock<HashMap<League, TrainingRecord>>,
}

impl TrainingScheduler {
    pub fn new(leagues: LeagueConfig) -> Self {
        Self {
            leagues,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn league_config(&self) -> &LeagueConfig {
        &self.leagues
    }

    pub fn needs_training(&self, league: League, force: bool) -> bool {
        self.needs_training_at(league, force, Utc::now())
    }

    pub fn needs_training_at(&self, league: League, force: bool, now: DateTime<Utc>) -> bool {
        self.training_reason_at(league, force, now).is_some()
    }

    /// First matching reason, or `None` when the current model is still good
    pub fn training_reason_at(
        &self,
        league: League,
        force: bool,
        now: DateTime<Utc>,
    ) -> Option<TrainingReason> {
        let Some(record) = self.record(league) else {
            return Some(TrainingReason::NeverTrained);
        };
        if force {
            return Some(TrainingReason::Forced);
        }

        let settings = self.leagues.get(league);
        let interval = Duration::days(i64::from(settings.effective_interval_days()));
        if now - record.last_trained_at >= interval {
            debug!(
                "TrainingScheduler: {} last trained {} ({} day interval elapsed)",
                league,
                record.last_trained_at,
                interval.num_days()
            );
            return Some(TrainingReason::IntervalElapsed);
        }

        if let Some(latest) = record.recent_performance.latest()
            && latest.accuracy < settings.performance_threshold
        {
            debug!(
                "TrainingScheduler: {} accuracy {:.3} below threshold {:.3}",
                league, latest.accuracy, settings.performance_threshold
            );
            return Some(TrainingReason::BelowThreshold);
        }

        None
    }

    /// Store the outcome of a completed training run
    pub fn record_training(
        &self,
        league: League,
        version: &str,
        metrics: PerformanceMetrics,
        trained_at: DateTime<Utc>,
    ) -> TrainingRecord {
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("TrainingScheduler: Lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        };
        let record = records.entry(league).or_insert_with(|| TrainingRecord {
            last_trained_at: trained_at,
            version: version.to_string(),
            recent_performance: PerformanceHistory::new(),
        });
        record.last_trained_at = trained_at;
        record.version = version.to_string();
        record.recent_performance.push(metrics);
        record.clone()
    }

    pub fn record(&self, league: League) -> Option<TrainingRecord> {
        match self.records.read() {
            Ok(records) => records.get(&league).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&league).cloned(),
        }
    }

    pub fn trained_leagues(&self) -> Vec<League> {
        let records = match self.records.read() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut leagues: Vec<League> = records.keys().copied().collect();
        leagues.sort_by_key(|l| l.code());
        leagues
    }
}
