use crate::domain::errors::EstimatorError;
use crate::domain::league::League;
use crate::domain::ml::{Estimator, FeatureVector, PerformanceMetrics, StreamingEstimator};
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Trained model tiers for one league.
///
/// Entries are shared as `Arc<ModelEntry>` snapshots. Only the streaming tier
/// changes after training, behind its own lock.
pub struct ModelEntry {
    pub league: League,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub synthetic_samples: usize,
    pub metrics: PerformanceMetrics,
    /// Permutation importance, most important first
    pub feature_importance: Vec<(String, f64)>,
    /// Timestamp of the newest stored game seen at training time
    pub newest_game_ms: Option<i64>,
    primary: Box<dyn Estimator>,
    ensemble: Box<dyn Estimator>,
    streaming: RwLock<Box<dyn StreamingEstimator>>,
}

impl ModelEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        league: League,
        version: String,
        trained_at: DateTime<Utc>,
        training_samples: usize,
        synthetic_samples: usize,
        metrics: PerformanceMetrics,
        feature_importance: Vec<(String, f64)>,
        primary: Box<dyn Estimator>,
        ensemble: Box<dyn Estimator>,
        streaming: Box<dyn StreamingEstimator>,
    ) -> Self {
        Self {
            league,
            version,
            trained_at,
            training_samples,
            synthetic_samples,
            metrics,
            feature_importance,
            newest_game_ms: None,
            primary,
            ensemble,
            streaming: RwLock::new(streaming),
        }
    }

    pub fn with_newest_game(mut self, newest_game_ms: Option<i64>) -> Self {
        self.newest_game_ms = newest_game_ms;
        self
    }

    /// p(1) from the primary forest
    pub fn predict_primary(&self, features: &FeatureVector) -> Result<f64, EstimatorError> {
        self.primary.predict_proba(features).map(|p| p[1])
    }

    pub fn predict_ensemble(&self, features: &FeatureVector) -> Result<f64, EstimatorError> {
        self.ensemble.predict_proba(features).map(|p| p[1])
    }

    pub fn predict_streaming(&self, features: &FeatureVector) -> Result<f64, EstimatorError> {
        match self.streaming.read() {
            Ok(model) => model.predict_proba(features).map(|p| p[1]),
            Err(poisoned) => poisoned.into_inner().predict_proba(features).map(|p| p[1]),
        }
    }

    pub fn streaming_is_fitted(&self) -> bool {
        match self.streaming.read() {
            Ok(model) => model.is_fitted(),
            Err(poisoned) => poisoned.into_inner().is_fitted(),
        }
    }

    /// Incremental update of the streaming tier
    pub fn partial_fit_streaming(
        &self,
        features: &[FeatureVector],
        target: &[f64],
    ) -> Result<(), EstimatorError> {
        let mut model = match self.streaming.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("ModelEntry[{}]: streaming lock poisoned, recovering", self.league);
                poisoned.into_inner()
            }
        };
        model.partial_fit(features, target)
    }

    pub fn top_features(&self, n: usize) -> Vec<(String, f64)> {
        self.feature_importance.iter().take(n).cloned().collect()
    }
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("league", &self.league)
            .field("version", &self.version)
            .field("trained_at", &self.trained_at)
            .field("training_samples", &self.training_samples)
            .field("primary", &self.primary.name())
            .field("ensemble", &self.ensemble.name())
            .finish()
    }
}
