//! Model training and the per-league model registry.

use crate::application::system::guard::{call_dependency, run_blocking};
use crate::application::training::dataset::{
    COLD_START_ROWS, GAMES_COLLECTION, GameRow, synthetic_rows, train_test_split,
};
use crate::application::training::model::ModelEntry;
use crate::application::training::scheduler::{TrainingReason, TrainingRecord, TrainingScheduler};
use crate::config::Config;
use crate::domain::config::LeagueSettings;
use crate::domain::errors::{EstimatorError, PredictionError};
use crate::domain::league::League;
use crate::domain::ml::{Estimator, FEATURE_COUNT, FEATURE_NAMES, FeatureVector, PerformanceMetrics};
use crate::domain::ports::{DocumentFilter, DocumentStore, FeatureContext, FeatureExtractor, SortSpec};
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::core::circuit_breaker::CircuitBreakerConfig;
use crate::infrastructure::core::circuit_breaker_registry::CircuitBreakerRegistry;
use crate::infrastructure::ml::{ForestEstimator, ForestParams, OnlineLogisticEstimator};
use crate::infrastructure::observability::Metrics;
use crate::domain::ml::StreamingEstimator;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Breaker guarding the document store
pub const DATABASE_BREAKER: &str = "database";

pub struct Trainer {
    documents: Arc<dyn DocumentStore>,
    extractor: Arc<dyn FeatureExtractor>,
    scheduler: Arc<TrainingScheduler>,
    models: TtlCache<League, Arc<ModelEntry>>,
    breakers: Arc<CircuitBreakerRegistry>,
    breaker_config: CircuitBreakerConfig,
    min_training_samples: usize,
    max_training_samples: usize,
    seed: u64,
    estimator_timeout: Duration,
    league_locks: HashMap<League, Arc<Mutex<()>>>,
    metrics: Metrics,
}

impl Trainer {
    pub fn new(
        config: &Config,
        documents: Arc<dyn DocumentStore>,
        extractor: Arc<dyn FeatureExtractor>,
        breakers: Arc<CircuitBreakerRegistry>,
        metrics: Metrics,
    ) -> Self {
        Self {
            documents,
            extractor,
            scheduler: Arc::new(TrainingScheduler::new(config.leagues.clone())),
            models: TtlCache::new(config.cache.model_cache_capacity, config.cache.model_cache_ttl()),
            breakers,
            breaker_config: config.resilience.breaker_config(),
            min_training_samples: config.training.min_training_samples,
            max_training_samples: config.training.max_training_samples,
            seed: config.training.synthetic_seed,
            estimator_timeout: config.resilience.estimator_timeout(),
            league_locks: League::ALL
                .iter()
                .map(|l| (*l, Arc::new(Mutex::new(()))))
                .collect(),
            metrics,
        }
    }

    pub fn scheduler(&self) -> &Arc<TrainingScheduler> {
        &self.scheduler
    }

    pub fn extractor(&self) -> &Arc<dyn FeatureExtractor> {
        &self.extractor
    }

    pub fn estimator_timeout(&self) -> Duration {
        self.estimator_timeout
    }

    /// Live model handle, `None` if never trained or expired from the cache
    pub fn model(&self, league: League) -> Option<Arc<ModelEntry>> {
        self.models.get(&league)
    }

    /// Register a model handle and its training record
    pub fn install(&self, entry: ModelEntry) -> Arc<ModelEntry> {
        let entry = Arc::new(entry);
        self.scheduler
            .record_training(entry.league, &entry.version, entry.metrics, entry.trained_at);
        self.models.set(entry.league, entry.clone());
        self.metrics
            .set_model_accuracy(entry.league.slug(), entry.metrics.accuracy);
        entry
    }

    pub fn training_record(&self, league: League) -> Option<TrainingRecord> {
        self.scheduler.record(league)
    }

    /// Drop expired model handles; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.models.purge_expired()
    }

    /// Current model, training first when the scheduler says so or the
    /// handle has expired. The boolean is `true` when this call trained.
    pub async fn get_or_train(
        &self,
        league: League,
        force: bool,
    ) -> Result<(Arc<ModelEntry>, bool), PredictionError> {
        if !force
            && let Some(entry) = self.model(league)
            && self.is_current(league, &entry).await
        {
            return Ok((entry, false));
        }

        let lock = self.lock_for(league);
        let _guard = lock.lock().await;

        // Another request may have finished training while we waited
        if !force
            && let Some(entry) = self.model(league)
            && self.is_current(league, &entry).await
        {
            return Ok((entry, false));
        }

        let entry = self.train_locked(league).await?;
        Ok((entry, true))
    }

    /// A model below its accuracy threshold is only retrained once newer
    /// games have been stored; refitting the same rows gives the same score.
    async fn is_current(&self, league: League, entry: &ModelEntry) -> bool {
        match self.scheduler.training_reason_at(league, false, Utc::now()) {
            None => true,
            Some(TrainingReason::BelowThreshold) => !self.has_newer_games(league, entry).await,
            Some(_) => false,
        }
    }

    async fn has_newer_games(&self, league: League, entry: &ModelEntry) -> bool {
        match self.recent_games(league, 1).await {
            Ok(games) => games.first().map(|g| g.timestamp) > entry.newest_game_ms,
            Err(e) => {
                warn!(
                    "Trainer: {} keeping model {}, could not check for new games: {}",
                    league, entry.version, e
                );
                false
            }
        }
    }

    /// Unconditionally retrain a league
    pub async fn train(&self, league: League) -> Result<Arc<ModelEntry>, PredictionError> {
        let lock = self.lock_for(league);
        let _guard = lock.lock().await;
        self.train_locked(league).await
    }

    fn lock_for(&self, league: League) -> Arc<Mutex<()>> {
        // The map is built from League::ALL so every key is present.
        self.league_locks[&league].clone()
    }

    /// Most recent stored games for a league, newest first
    pub async fn recent_games(
        &self,
        league: League,
        limit: usize,
    ) -> Result<Vec<GameRow>, PredictionError> {
        let breaker = self
            .breakers
            .get_or_create(DATABASE_BREAKER, self.breaker_config)
            .await;

        let mut filter = DocumentFilter::new();
        filter.insert("league".to_string(), json!(league.code()));
        let sort = SortSpec::descending("timestamp");

        let docs = call_dependency(
            &breaker,
            self.documents.find(GAMES_COLLECTION, &filter, Some(&sort), limit),
        )
        .await?;

        Ok(docs
            .iter()
            .filter_map(|doc| GameRow::from_document(league, doc))
            .collect())
    }

    async fn train_locked(&self, league: League) -> Result<Arc<ModelEntry>, PredictionError> {
        let result = self.run_training(league).await;
        match &result {
            Ok(entry) => {
                self.metrics.inc_trainings(league.slug(), "success");
                info!(
                    "Trainer: {} model {} trained on {} rows ({} synthetic), accuracy={:.3}",
                    league,
                    entry.version,
                    entry.training_samples,
                    entry.synthetic_samples,
                    entry.metrics.accuracy
                );
            }
            Err(e) => {
                self.metrics.inc_trainings(league.slug(), "failure");
                warn!("Trainer: {} training failed: {}", league, e);
            }
        }
        result
    }

    async fn run_training(&self, league: League) -> Result<Arc<ModelEntry>, PredictionError> {
        let games = self.recent_games(league, self.max_training_samples).await?;
        let newest_game_ms = games.iter().map(|g| g.timestamp).max();
        let context = FeatureContext::for_league(league);

        let (mut features, mut target): (Vec<FeatureVector>, Vec<f64>) = games
            .iter()
            .filter_map(|g| {
                g.outcome
                    .map(|y| (self.extractor.extract(&g.input_data, &context), y))
            })
            .unzip();

        let mut synthetic_samples = 0;
        if features.len() < self.min_training_samples {
            let wanted = self.min_training_samples.max(COLD_START_ROWS) - features.len();
            info!(
                "Trainer: {} has {} labelled games (< {}), adding {} cold-start rows",
                league,
                features.len(),
                self.min_training_samples,
                wanted
            );
            let (sx, sy) = synthetic_rows(league, wanted, self.seed);
            features.extend(sx);
            target.extend(sy);
            synthetic_samples = wanted;
        }

        let settings = self.scheduler.league_config().get(league).clone();
        let trained_at = Utc::now();
        let version = format!("{}-{}", league.slug(), trained_at.format("%Y%m%d%H%M%S%3f"));
        let seed = self.seed;

        let entry = run_blocking(self.estimator_timeout, "training", move || {
            fit_models(
                league,
                &settings,
                features,
                target,
                seed,
                version,
                trained_at,
                synthetic_samples,
            )
        })
        .await?;

        Ok(self.install(entry.with_newest_game(newest_game_ms)))
    }
}

#[allow(clippy::too_many_arguments)]
fn fit_models(
    league: League,
    settings: &LeagueSettings,
    features: Vec<FeatureVector>,
    target: Vec<f64>,
    seed: u64,
    version: String,
    trained_at: DateTime<Utc>,
    synthetic_samples: usize,
) -> Result<ModelEntry, EstimatorError> {
    let total = features.len();
    let split = train_test_split(features, target, seed);

    let mut primary = ForestEstimator::new(
        "primary_forest",
        ForestParams::new(settings.primary_trees, settings.primary_max_depth),
    );
    primary.fit(&split.train_x, &split.train_y)?;

    let mut ensemble = ForestEstimator::new(
        "ensemble_forest",
        ForestParams::new(settings.ensemble_trees, settings.ensemble_max_depth),
    );
    ensemble.fit(&split.train_x, &split.train_y)?;

    let mut streaming = OnlineLogisticEstimator::new();
    streaming.fit(&split.train_x, &split.train_y)?;

    let (eval_x, eval_y) = if split.test_x.is_empty() {
        (&split.train_x, &split.train_y)
    } else {
        (&split.test_x, &split.test_y)
    };
    let predicted = primary.predict_many(eval_x)?;
    let metrics = PerformanceMetrics::from_labels(&predicted, eval_y);
    let feature_importance = permutation_importance(&primary, eval_x, eval_y, seed);

    Ok(ModelEntry::new(
        league,
        version,
        trained_at,
        total,
        synthetic_samples,
        metrics,
        feature_importance,
        Box::new(primary),
        Box::new(ensemble),
        Box::new(streaming) as Box<dyn StreamingEstimator>,
    ))
}

fn accuracy(model: &ForestEstimator, x: &[FeatureVector], y: &[f64]) -> f64 {
    match model.predict_many(x) {
        Ok(predicted) => PerformanceMetrics::from_labels(&predicted, y).accuracy,
        Err(_) => 0.0,
    }
}

/// Accuracy lost when one feature column is shuffled, per feature, sorted
/// descending. Columns are scored in parallel.
pub fn permutation_importance(
    model: &ForestEstimator,
    x: &[FeatureVector],
    y: &[f64],
    seed: u64,
) -> Vec<(String, f64)> {
    let baseline = accuracy(model, x, y);

    let mut scores: Vec<(String, f64)> = (0..FEATURE_COUNT)
        .into_par_iter()
        .map(|col| {
            let mut column: Vec<f64> = x.iter().map(|row| row.as_slice()[col]).collect();
            column.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(col as u64)));

            let permuted: Vec<FeatureVector> = x
                .iter()
                .zip(&column)
                .map(|(row, v)| {
                    let mut values = row.to_vec();
                    values[col] = *v;
                    FeatureVector::new(values)
                })
                .collect();

            let drop = (baseline - accuracy(model, &permuted, y)).max(0.0);
            (FEATURE_NAMES[col].to_string(), drop)
        })
        .collect();

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::nlp::HeuristicFeatureExtractor;
    use crate::infrastructure::repositories::InMemoryDocumentStore;

    fn trainer_with(documents: Arc<dyn DocumentStore>) -> Trainer {
        Trainer::new(
            &Config::default(),
            documents,
            Arc::new(HeuristicFeatureExtractor::new()),
            Arc::new(CircuitBreakerRegistry::new()),
            Metrics::new().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_cold_start_training() {
        let trainer = trainer_with(Arc::new(InMemoryDocumentStore::new()));
        assert!(trainer.model(League::Nba).is_none());

        let (entry, trained) = trainer.get_or_train(League::Nba, false).await.unwrap();
        assert!(trained);
        assert_eq!(entry.training_samples, COLD_START_ROWS);
        assert_eq!(entry.synthetic_samples, COLD_START_ROWS);
        assert!(entry.version.starts_with("nba-"));
        assert_eq!(entry.feature_importance.len(), FEATURE_COUNT);
        assert!(entry.streaming_is_fitted());
        assert!(trainer.training_record(League::Nba).is_some());
    }

    #[tokio::test]
    async fn test_stored_games_are_used() {
        let store = Arc::new(InMemoryDocumentStore::new());
        for i in 0..30 {
            let win = i % 2 == 0;
            store
                .insert(
                    GAMES_COLLECTION,
                    json!({
                        "league": "NFL",
                        "timestamp": i,
                        "input_data": {"win_pct": if win { 0.8 } else { 0.2 }},
                        "outcome": if win { 1 } else { 0 }
                    }),
                )
                .await
                .unwrap();
        }
        let trainer = trainer_with(store);
        let entry = trainer.train(League::Nfl).await.unwrap();
        assert_eq!(entry.training_samples, 30);
        assert_eq!(entry.synthetic_samples, 0);
    }

    #[tokio::test]
    async fn test_fresh_model_is_reused() {
        let trainer = trainer_with(Arc::new(InMemoryDocumentStore::new()));
        let (first, _) = trainer.get_or_train(League::Mlb, false).await.unwrap();
        let (second, trained) = trainer.get_or_train(League::Mlb, false).await.unwrap();

        assert!(!trained);
        assert!(Arc::ptr_eq(&first, &second));
    }

    fn poor_metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            accuracy: 0.1,
            precision: 0.1,
            recall: 0.1,
            f1: 0.1,
        }
    }

    #[tokio::test]
    async fn test_low_accuracy_waits_for_new_games() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let trainer = trainer_with(store.clone());
        let (first, _) = trainer.get_or_train(League::Nhl, false).await.unwrap();
        assert_eq!(first.newest_game_ms, None);

        trainer
            .scheduler()
            .record_training(League::Nhl, &first.version, poor_metrics(), Utc::now());
        for _ in 0..3 {
            let (entry, trained) = trainer.get_or_train(League::Nhl, false).await.unwrap();
            assert!(!trained);
            assert!(Arc::ptr_eq(&first, &entry));
        }

        store
            .insert(
                GAMES_COLLECTION,
                json!({
                    "league": "NHL",
                    "timestamp": 1_700_000_000_000_i64,
                    "input_data": {"win_pct": 0.7},
                    "outcome": 1
                }),
            )
            .await
            .unwrap();
        let (retrained, trained) = trainer.get_or_train(League::Nhl, false).await.unwrap();
        assert!(trained);
        assert_eq!(retrained.newest_game_ms, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_concurrent_training_is_serialised() {
        let trainer = Arc::new(trainer_with(Arc::new(InMemoryDocumentStore::new())));
        let a = {
            let t = trainer.clone();
            tokio::spawn(async move { t.train(League::Epl).await })
        };
        let b = {
            let t = trainer.clone();
            tokio::spawn(async move { t.train(League::Epl).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(
            trainer
                .training_record(League::Epl)
                .unwrap()
                .recent_performance
                .len(),
            2
        );
    }
}
