mod common;

use common::{fast_config, init_tracing};
use propcast::application::prediction::{PredictionContext, PredictionOrchestrator};
use propcast::application::training::GAMES_COLLECTION;
use propcast::domain::errors::ErrorKind;
use propcast::domain::league::League;
use propcast::domain::prediction::{Insight, PredictionType};
use serde_json::json;

#[tokio::test]
async fn test_nba_single_factor_trains_on_cold_start() -> anyhow::Result<()> {
    init_tracing();
    let ctx = PredictionContext::in_memory(fast_config())?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let response = orchestrator
        .handle_json(&json!({
            "league": "NBA",
            "prediction_type": "single_factor",
            "input_data": {"team": "Lakers", "points": 110, "is_home": 1}
        }))
        .await;
    let result = response.result().expect("prediction should succeed");

    let p = result.probability().expect("probability present");
    assert!((0.0..=1.0).contains(&p));
    assert!((50.0..=100.0).contains(&result.confidence_score));
    assert_eq!(result.metadata.league, League::Nba);
    assert_eq!(result.metadata.prediction_type, PredictionType::SingleFactor);
    assert!(!result.metadata.cached);
    assert!(result.metadata.model_version.starts_with("nba-"));
    // Cold start tops up to 200 synthetic rows
    assert_eq!(result.metadata.data_point_count, 200);

    assert!(matches!(result.insights[0], Insight::FeatureImportance { ref top } if top.len() == 5));
    assert!(result.insights.iter().any(|i| matches!(
        i,
        Insight::HistoricalTrend { games: 0, trend, .. } if trend == "insufficient_data"
    )));
    assert!(result
        .insights
        .iter()
        .any(|i| matches!(i, Insight::ModelPerformance { .. })));

    assert_eq!(ctx.trainer.scheduler().trained_leagues(), vec![League::Nba]);
    assert_eq!(
        ctx.metrics
            .model_trainings_total
            .with_label_values(&["nba", "success"])
            .get(),
        1.0
    );
    Ok(())
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() -> anyhow::Result<()> {
    let ctx = PredictionContext::in_memory(fast_config())?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());
    let request = json!({
        "league": "NFL",
        "prediction_type": "single_factor",
        "input_data": {"team": "Chiefs", "points": 27}
    });

    let first = orchestrator.handle_json(&request).await;
    let second = orchestrator.handle_json(&request).await;

    let first = first.result().expect("first succeeds");
    let second = second.result().expect("second succeeds");
    assert!(!first.metadata.cached);
    assert!(second.metadata.cached);
    assert_eq!(first.main_prediction, second.main_prediction);
    assert_eq!(
        ctx.metrics
            .predictions_total
            .with_label_values(&["nfl", "single_factor", "cache"])
            .get(),
        1.0
    );
    assert_eq!(
        ctx.metrics
            .model_trainings_total
            .with_label_values(&["nfl", "success"])
            .get(),
        1.0
    );
    Ok(())
}

#[tokio::test]
async fn test_stored_games_feed_training_and_trend() -> anyhow::Result<()> {
    let ctx = PredictionContext::in_memory(fast_config())?;
    for i in 0..30 {
        ctx.documents
            .insert(
                GAMES_COLLECTION,
                json!({
                    "league": "MLB",
                    "timestamp": i,
                    "input_data": {"runs": 3 + i % 5, "is_home": i % 2},
                    "outcome": if i % 3 == 0 { 0 } else { 1 },
                }),
            )
            .await?;
    }
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let response = orchestrator
        .handle_json(&json!({
            "league": "MLB",
            "prediction_type": "single_factor",
            "input_data": {"runs": 5, "is_home": 1}
        }))
        .await;
    let result = response.result().expect("prediction should succeed");

    // 30 stored labelled rows are above the minimum of 20, so no synthetic top-up
    assert_eq!(result.metadata.data_point_count, 30);
    let trend_games = result.insights.iter().find_map(|i| match i {
        Insight::HistoricalTrend { games, .. } => Some(*games),
        _ => None,
    });
    assert_eq!(trend_games, Some(20));
    Ok(())
}

#[tokio::test]
async fn test_multi_factor_skips_failed_factors() -> anyhow::Result<()> {
    let ctx = PredictionContext::in_memory(fast_config())?;
    let orchestrator = PredictionOrchestrator::new(ctx);

    let response = orchestrator
        .handle_json(&json!({
            "league": "NHL",
            "prediction_type": "multi_factor",
            "input_data": {"team": "Bruins"},
            "factors": [
                {"input_data": {"goals": 4, "is_home": 1}, "weight": 1.0},
                {"input_data": {}, "weight": 2.0}
            ]
        }))
        .await;
    let result = response.result().expect("one factor is enough");

    match &result.insights[0] {
        Insight::FactorBreakdown { factors, skipped } => {
            assert_eq!(*skipped, 1);
            assert_eq!(factors.len(), 1);
            assert_eq!(factors[0].index, 0);
            assert!((factors[0].weight - 1.0).abs() < 1e-9);
            let p = result.probability().unwrap();
            assert!((p - factors[0].probability).abs() < 1e-9);
        }
        other => panic!("unexpected first insight {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_multi_factor_all_failed() -> anyhow::Result<()> {
    let ctx = PredictionContext::in_memory(fast_config())?;
    let orchestrator = PredictionOrchestrator::new(ctx);

    let response = orchestrator
        .handle_json(&json!({
            "league": "NHL",
            "prediction_type": "multi_factor",
            "input_data": {"team": "Bruins"},
            "factors": [{"input_data": {}}, {"input_data": {}}]
        }))
        .await;
    let error = response.error().expect("all factors failed");
    assert_eq!(error.kind, ErrorKind::NoValidPredictions);
    assert_eq!(error.input["input_data"]["team"], "Bruins");
    Ok(())
}

#[tokio::test]
async fn test_advanced_blends_three_components() -> anyhow::Result<()> {
    let ctx = PredictionContext::in_memory(fast_config())?;
    let orchestrator = PredictionOrchestrator::new(ctx);

    let response = orchestrator
        .handle_json(&json!({
            "league": "EPL",
            "prediction_type": "advanced",
            "input_data": {"team": "Arsenal", "goals": 2, "win_pct": 0.7}
        }))
        .await;
    let result = response.result().expect("advanced succeeds");

    match &result.insights[0] {
        Insight::ComponentBreakdown { components, spread } => {
            assert_eq!(components.len(), 3);
            let total: f64 = components.iter().map(|c| c.weight).sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!((components[0].weight - 0.4).abs() < 1e-9);
            assert!((components[2].weight - 0.2).abs() < 1e-9);
            assert!(*spread >= 0.0);
        }
        other => panic!("unexpected first insight {:?}", other),
    }
    assert!((0.0..=100.0).contains(&result.confidence_score));
    Ok(())
}

#[tokio::test]
async fn test_real_time_flushes_labelled_batch() -> anyhow::Result<()> {
    let mut config = fast_config();
    config.streaming.batch_size = 2;
    config.streaming.flush_interval_secs = 0;
    let ctx = PredictionContext::in_memory(config)?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let first = orchestrator
        .handle_json(&json!({
            "league": "WNBA",
            "prediction_type": "real_time",
            "input_data": {"points": 88, "outcome": 1}
        }))
        .await;
    let first = first.result().expect("first succeeds");
    assert!(first
        .insights
        .iter()
        .any(|i| matches!(i, Insight::Streaming { queue_depth: 1, flushed: 0 })));

    let second = orchestrator
        .handle_json(&json!({
            "league": "WNBA",
            "prediction_type": "real_time",
            "input_data": {"points": 71, "outcome": 0}
        }))
        .await;
    let second = second.result().expect("second succeeds");
    assert!(second
        .insights
        .iter()
        .any(|i| matches!(i, Insight::Streaming { queue_depth: 0, flushed: 2 })));
    assert_eq!(ctx.streams.depth(League::Wnba), 0);
    Ok(())
}

#[tokio::test]
async fn test_health_check_bypasses_cache_and_model() -> anyhow::Result<()> {
    let ctx = PredictionContext::in_memory(fast_config())?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let response = orchestrator
        .handle_json(&json!({
            "league": "MLS",
            "prediction_type": "health_check",
            "input_data": {"probe": true}
        }))
        .await;
    let result = response.result().expect("health check succeeds");

    assert_eq!(result.main_prediction["status"], "healthy");
    assert_eq!(result.main_prediction["trained_leagues"], json!([]));
    assert_eq!(result.main_prediction["model_loaded"], false);
    assert_eq!(result.metadata.model_version, "untrained");
    assert!(ctx.cache.is_empty());
    assert!(ctx.trainer.scheduler().trained_leagues().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_default_thresholds_train_once_without_new_games() -> anyhow::Result<()> {
    let mut config = propcast::config::Config::default();
    config.resilience.rate_limit_cooldown_ms = 0;
    let ctx = PredictionContext::in_memory(config)?;
    let orchestrator = PredictionOrchestrator::new(ctx.clone());

    let mut versions = Vec::new();
    for points in [98, 104, 111, 117] {
        let response = orchestrator
            .handle_json(&json!({
                "league": "NBA",
                "prediction_type": "single_factor",
                "input_data": {"team": "Celtics", "points": points}
            }))
            .await;
        let result = response.result().expect("prediction should succeed");
        assert!(!result.metadata.cached);
        versions.push(result.metadata.model_version.clone());
    }

    versions.dedup();
    assert_eq!(versions.len(), 1);
    assert_eq!(
        ctx.metrics
            .model_trainings_total
            .with_label_values(&["nba", "success"])
            .get(),
        1.0
    );
    Ok(())
}
