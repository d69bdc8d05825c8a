use crate::application::prediction::rate_limiter::RateLimiter;
use crate::application::prediction::streaming::StreamBuffer;
use crate::application::training::Trainer;
use crate::config::Config;
use crate::domain::ports::{DocumentStore, FeatureExtractor, KeyValueStore};
use crate::infrastructure::cache::PredictionCache;
use crate::infrastructure::core::circuit_breaker_registry::CircuitBreakerRegistry;
use crate::infrastructure::nlp::HeuristicFeatureExtractor;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::{Database, SqliteDocumentStore};
use crate::infrastructure::repositories::{InMemoryDocumentStore, InMemoryKeyValueStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Everything a request needs, built once at startup and shared.
pub struct PredictionContext {
    pub config: Config,
    pub metrics: Metrics,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub documents: Arc<dyn DocumentStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub trainer: Trainer,
    pub cache: PredictionCache,
    pub rate_limiter: RateLimiter,
    pub streams: StreamBuffer,
}

impl PredictionContext {
    /// Wire the configured backends: SQLite documents when `DATABASE_URL`
    /// is set, in-memory otherwise.
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let metrics = Metrics::new().context("Failed to register metrics")?;

        let documents: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => {
                let db = Database::new(url).await?;
                Arc::new(SqliteDocumentStore::new(db.pool))
            }
            None => {
                info!("PredictionContext: DATABASE_URL not set, using in-memory document store");
                Arc::new(InMemoryDocumentStore::new())
            }
        };

        Ok(Arc::new(Self::with_stores(
            config,
            metrics,
            documents,
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(HeuristicFeatureExtractor::new()),
        )))
    }

    pub fn with_stores(
        config: Config,
        metrics: Metrics,
        documents: Arc<dyn DocumentStore>,
        kv: Arc<dyn KeyValueStore>,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::with_metrics(metrics.clone()));
        let trainer = Trainer::new(
            &config,
            documents.clone(),
            extractor,
            breakers.clone(),
            metrics.clone(),
        );
        let cache = PredictionCache::new(
            config.cache.prediction_cache_capacity,
            config.cache.prediction_cache_ttl(),
        );
        let rate_limiter = RateLimiter::new(
            kv.clone(),
            breakers.clone(),
            config.resilience.breaker_config(),
            config.resilience.rate_limit_cooldown(),
            config.resilience.rate_limit_marker_ttl(),
        );
        let streams = StreamBuffer::new(&config.streaming);

        Self {
            config,
            metrics,
            breakers,
            documents,
            kv,
            trainer,
            cache,
            rate_limiter,
            streams,
        }
    }

    /// In-memory stores throughout; used by tests and one-shot commands
    pub fn in_memory(config: Config) -> Result<Arc<Self>> {
        let metrics = Metrics::new().context("Failed to register metrics")?;
        Ok(Arc::new(Self::with_stores(
            config,
            metrics,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(HeuristicFeatureExtractor::new()),
        )))
    }
}
