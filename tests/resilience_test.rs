mod common;

use anyhow::Result;
use async_trait::async_trait;
use common::{fast_config, init_tracing};
use propcast::application::prediction::{PredictionContext, PredictionOrchestrator};
use propcast::domain::errors::ErrorKind;
use propcast::domain::league::League;
use propcast::domain::ports::{DocumentFilter, DocumentStore, SortSpec};
use propcast::infrastructure::core::CircuitState;
use propcast::infrastructure::nlp::HeuristicFeatureExtractor;
use propcast::infrastructure::observability::Metrics;
use propcast::infrastructure::repositories::InMemoryKeyValueStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Document store whose reads always fail
#[derive(Default)]
struct FailingStore {
    finds: AtomicUsize,
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn find(
        &self,
        _collection: &str,
        _filter: &DocumentFilter,
        _sort: Option<&SortSpec>,
        _limit: usize,
    ) -> Result<Vec<Value>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("database is down")
    }

    async fn insert(&self, _collection: &str, _document: Value) -> Result<()> {
        anyhow::bail!("database is down")
    }
}

fn single(league: &str, points: i64) -> Value {
    json!({
        "league": league,
        "prediction_type": "single_factor",
        "input_data": {"points": points}
    })
}

#[tokio::test]
async fn test_open_breaker_fails_fast_without_touching_the_store() -> anyhow::Result<()> {
    init_tracing();
    let mut config = fast_config();
    config.resilience.breaker_failure_threshold = 2;
    config.resilience.breaker_reset_timeout_secs = 60;

    let store = Arc::new(FailingStore::default());
    let ctx = Arc::new(PredictionContext::with_stores(
        config,
        Metrics::new()?,
        store.clone(),
        Arc::new(InMemoryKeyValueStore::new()),
        Arc::new(HeuristicFeatureExtractor::new()),
    ));
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    for points in [100, 101] {
        let response = orchestrator.handle_json(&single("NBA", points)).await;
        assert_eq!(
            response.error().map(|e| e.kind),
            Some(ErrorKind::DependencyFailure)
        );
    }
    assert_eq!(store.finds.load(Ordering::SeqCst), 2);

    let breaker = ctx
        .breakers
        .get(&PredictionOrchestrator::breaker_name(propcast::domain::league::League::Nba))
        .await
        .expect("inference breaker registered");
    assert_eq!(breaker.state().await, CircuitState::Open);

    let response = orchestrator.handle_json(&single("NBA", 102)).await;
    let error = response.error().expect("gated");
    assert_eq!(error.kind, ErrorKind::ServiceUnavailable);
    assert!(error.retry_after_seconds.is_some());
    assert_eq!(store.finds.load(Ordering::SeqCst), 2);

    // Other leagues have their own breaker
    let response = orchestrator.handle_json(&single("NFL", 20)).await;
    assert_eq!(
        response.error().map(|e| e.kind),
        Some(ErrorKind::ServiceUnavailable),
        "database breaker is shared, so NFL training is rejected by it"
    );
    let nfl = ctx
        .breakers
        .get("inference.nfl")
        .await
        .expect("nfl breaker registered");
    assert_eq!(nfl.state().await, CircuitState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_validation_errors_do_not_trip_the_breaker() -> anyhow::Result<()> {
    let mut config = fast_config();
    config.resilience.breaker_failure_threshold = 1;
    let ctx = PredictionContext::in_memory(config)?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    for bad in [
        json!({"league": "NBA", "prediction_type": "single_factor", "input_data": {}}),
        json!({"league": "XFL", "prediction_type": "single_factor", "input_data": {"a": 1}}),
        json!({"league": "NBA", "prediction_type": "guess", "input_data": {"a": 1}}),
        json!({"league": "NBA", "input_data": {"a": 1}}),
    ] {
        let response = orchestrator.handle_json(&bad).await;
        let error = response.error().expect("invalid request");
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.input, bad);
    }
    assert_eq!(
        ctx.metrics
            .prediction_errors_total
            .with_label_values(&["validation_error"])
            .get(),
        4.0
    );

    let response = orchestrator.handle_json(&single("NBA", 99)).await;
    assert!(response.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_cooldown_is_neutral_for_the_breaker() -> anyhow::Result<()> {
    let mut config = fast_config();
    config.resilience.rate_limit_cooldown_ms = 60_000;
    config.resilience.breaker_failure_threshold = 1;
    let ctx = PredictionContext::in_memory(config)?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    assert!(orchestrator.handle_json(&single("NBA", 100)).await.is_ok());

    for points in [101, 102] {
        let response = orchestrator.handle_json(&single("NBA", points)).await;
        let error = response.error().expect("rate limited");
        assert_eq!(error.kind, ErrorKind::RateLimitExceeded);
        assert!(error.retry_after_seconds.unwrap_or(0) > 0);
    }

    // Identical request is a cache hit, served before the rate limit
    let cached = orchestrator.handle_json(&single("NBA", 100)).await;
    assert!(cached.result().expect("cache hit").metadata.cached);

    // Cooldown is per league
    assert!(orchestrator.handle_json(&single("NHL", 3)).await.is_ok());

    let breaker = ctx
        .breakers
        .get("inference.nba")
        .await
        .expect("inference breaker registered");
    let status = breaker.status().await;
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.total_failures, 0);
    Ok(())
}

#[tokio::test]
async fn test_estimator_deadline_counts_as_timeout() -> anyhow::Result<()> {
    init_tracing();
    // Full-size forests cannot be fitted within a millisecond
    let mut config = propcast::config::Config::default();
    config.resilience.estimator_timeout_ms = 1;
    config.resilience.rate_limit_cooldown_ms = 0;
    let ctx = PredictionContext::in_memory(config)?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let response = orchestrator.handle_json(&single("NBA", 100)).await;
    let error = response.error().expect("training should miss its deadline");
    assert_eq!(error.kind, ErrorKind::DependencyFailure);
    assert!(error.message.contains("timed out"), "{}", error.message);

    let status = ctx
        .breakers
        .get("inference.nba")
        .await
        .expect("inference breaker registered")
        .status()
        .await;
    assert_eq!(status.total_timeouts, 1);
    assert_eq!(status.total_failures, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_share_one_cooldown() -> anyhow::Result<()> {
    let mut config = fast_config();
    config.resilience.rate_limit_cooldown_ms = 5_000;
    let ctx = PredictionContext::in_memory(config)?;
    ctx.trainer.train(League::Nba).await?;
    let orchestrator = Arc::new(PredictionOrchestrator::new(ctx.clone()));

    let (a, b) = tokio::join!(
        {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.handle_json(&single("NBA", 100)).await })
        },
        {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.handle_json(&single("NBA", 120)).await })
        }
    );
    let responses = [a?, b?];

    assert_eq!(responses.iter().filter(|r| r.is_ok()).count(), 1);
    let limited = responses
        .iter()
        .find_map(|r| r.error())
        .expect("one request throttled");
    assert_eq!(limited.kind, ErrorKind::RateLimitExceeded);
    Ok(())
}

#[tokio::test]
async fn test_failed_prediction_does_not_start_cooldown() -> anyhow::Result<()> {
    let mut config = fast_config();
    config.resilience.rate_limit_cooldown_ms = 60_000;
    let ctx = PredictionContext::in_memory(config)?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let failed = orchestrator
        .handle_json(&json!({
            "league": "NBA",
            "prediction_type": "multi_factor",
            "input_data": {"team": "Lakers"},
            "factors": [{"input_data": {}}]
        }))
        .await;
    assert_eq!(
        failed.error().map(|e| e.kind),
        Some(ErrorKind::NoValidPredictions)
    );

    assert!(orchestrator.handle_json(&single("NBA", 100)).await.is_ok());
    let limited = orchestrator.handle_json(&single("NBA", 101)).await;
    assert_eq!(
        limited.error().map(|e| e.kind),
        Some(ErrorKind::RateLimitExceeded)
    );
    Ok(())
}
