//! Request pipeline: validation, breaker gate, cache, rate limit, dispatch.

use crate::application::prediction::context::PredictionContext;
use crate::application::prediction::fingerprint::fingerprint;
use crate::application::prediction::insights;
use crate::application::prediction::streaming::StreamItem;
use crate::application::system::guard::run_blocking;
use crate::application::training::ModelEntry;
use crate::application::training::dataset::parse_outcome;
use crate::domain::errors::{ErrorResult, PredictionError};
use crate::domain::league::League;
use crate::domain::ml::FeatureVector;
use crate::domain::ports::FeatureContext;
use crate::domain::prediction::{
    ComponentContribution, FactorContribution, FactorInput, InputData, Insight,
    PredictionMetadata, PredictionRequest, PredictionResult, PredictionType,
};
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitState};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use statrs::statistics::{Data, Distribution};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Features listed in the importance insight
const TOP_FEATURES: usize = 5;

/// Blend weights of the advanced strategy, renormalised over successes
const ADVANCED_WEIGHTS: [(&str, f64); 3] = [("primary", 0.4), ("ensemble", 0.4), ("streaming", 0.2)];

/// Outcome of one request, serialised as either shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Ok(PredictionResult),
    Err(ErrorResult),
}

impl PredictionResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, PredictionResponse::Ok(_))
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            PredictionResponse::Ok(result) => Some(result),
            PredictionResponse::Err(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorResult> {
        match self {
            PredictionResponse::Ok(_) => None,
            PredictionResponse::Err(err) => Some(err),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serves prediction requests against the shared context
pub struct PredictionOrchestrator {
    ctx: Arc<PredictionContext>,
}

impl PredictionOrchestrator {
    pub fn new(ctx: Arc<PredictionContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<PredictionContext> {
        &self.ctx
    }

    /// Breaker gating model inference for a league
    pub fn breaker_name(league: League) -> String {
        format!("inference.{}", league.slug())
    }

    /// Parse an untyped request, then serve it
    pub async fn handle_json(&self, raw: &Value) -> PredictionResponse {
        let started = Instant::now();
        match PredictionRequest::from_json(raw) {
            Ok(request) => self.serve(request, raw.clone(), started).await,
            Err(e) => self.finish(Err(e), "invalid", raw.clone(), started),
        }
    }

    /// Serve a typed request. Never fails: errors come back as `ErrorResult`.
    pub async fn predict(&self, request: PredictionRequest) -> PredictionResponse {
        let started = Instant::now();
        let input = serde_json::to_value(&request).unwrap_or(Value::Null);
        if let Err(e) = request.validate() {
            return self.finish(Err(e), request.prediction_type.as_str(), input, started);
        }
        self.serve(request, input, started).await
    }

    async fn serve(
        &self,
        request: PredictionRequest,
        input: Value,
        started: Instant,
    ) -> PredictionResponse {
        let outcome = self.execute(&request).await;
        self.finish(outcome, request.prediction_type.as_str(), input, started)
    }

    fn finish(
        &self,
        outcome: Result<PredictionResult, PredictionError>,
        type_label: &str,
        input: Value,
        started: Instant,
    ) -> PredictionResponse {
        self.ctx
            .metrics
            .observe_latency(type_label, started.elapsed().as_secs_f64());
        match outcome {
            Ok(result) => PredictionResponse::Ok(result),
            Err(e) => {
                self.ctx.metrics.inc_errors(e.kind().as_str());
                warn!("PredictionOrchestrator: {} request failed: {}", type_label, e);
                PredictionResponse::Err(ErrorResult::from_error(&e, input))
            }
        }
    }

    async fn execute(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let league = request.league;
        let type_label = request.prediction_type.as_str();

        if request.prediction_type == PredictionType::HealthCheck {
            return self.health_check(league).await;
        }

        let breaker = self
            .ctx
            .breakers
            .get_or_create(
                &Self::breaker_name(league),
                self.ctx.config.resilience.breaker_config(),
            )
            .await;
        breaker
            .try_acquire()
            .await
            .map_err(|open| PredictionError::ServiceUnavailable {
                dependency: open.name,
                retry_after_secs: open.retry_after_secs,
            })?;

        let key = fingerprint(request);
        if let Some(cached) = self.ctx.cache.get(&key) {
            self.ctx.metrics.inc_cache("prediction", "hit");
            self.ctx
                .metrics
                .inc_predictions(league.slug(), type_label, "cache");
            breaker.release().await;
            debug!("PredictionOrchestrator: Cache hit for {} {}", league, type_label);
            return Ok(cached.result.as_cached());
        }
        self.ctx.metrics.inc_cache("prediction", "miss");

        let claim = match self.ctx.rate_limiter.acquire(league).await {
            Ok(claim) => claim,
            Err(e) => {
                breaker.release().await;
                return Err(e);
            }
        };

        let outcome = self.dispatch(request).await;
        self.settle(&breaker, &outcome).await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.ctx.rate_limiter.release(claim).await;
                return Err(e);
            }
        };
        self.ctx.cache.set(&key, result.clone());
        self.ctx.rate_limiter.commit(claim).await;
        self.ctx
            .metrics
            .inc_predictions(league.slug(), type_label, "model");
        Ok(result)
    }

    async fn settle(
        &self,
        breaker: &CircuitBreaker,
        outcome: &Result<PredictionResult, PredictionError>,
    ) {
        match outcome {
            Ok(_) => breaker.record_success().await,
            Err(e) if e.is_timeout() => breaker.record_timeout().await,
            Err(e) if e.counts_toward_breaker() => breaker.record_failure().await,
            Err(_) => breaker.release().await,
        }
    }

    async fn dispatch(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        match request.prediction_type {
            PredictionType::SingleFactor => self.single_factor(request).await,
            PredictionType::MultiFactor => self.multi_factor(request).await,
            PredictionType::RealTime => self.real_time(request).await,
            PredictionType::Advanced => self.advanced(request).await,
            PredictionType::HealthCheck => self.health_check(request.league).await,
        }
    }

    fn extract(&self, league: League, input: &InputData) -> FeatureVector {
        self.ctx
            .trainer
            .extractor()
            .extract(input, &FeatureContext::for_league(league))
    }

    async fn predict_primary(
        &self,
        entry: &Arc<ModelEntry>,
        features: FeatureVector,
        task: &str,
    ) -> Result<f64, PredictionError> {
        let model = entry.clone();
        run_blocking(self.ctx.trainer.estimator_timeout(), task, move || {
            model.predict_primary(&features)
        })
        .await
    }

    /// Importance, trend and performance insights for a trained league.
    /// A trend lookup failure drops that insight only.
    async fn model_insights(&self, league: League, entry: &ModelEntry) -> Vec<Insight> {
        let mut out = vec![insights::feature_importance(entry, TOP_FEATURES)];
        match self
            .ctx
            .trainer
            .recent_games(league, self.ctx.config.training.trend_window)
            .await
        {
            Ok(games) => out.push(insights::historical_trend(&games)),
            Err(e) => warn!(
                "PredictionOrchestrator: Skipping historical trend for {}: {}",
                league, e
            ),
        }
        let record = self.ctx.trainer.training_record(league);
        out.push(insights::model_performance(entry, record.as_ref()));
        out
    }

    async fn single_factor(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let league = request.league;
        let (entry, _) = self.ctx.trainer.get_or_train(league, false).await?;
        let features = self.extract(league, &request.input_data);
        let probability = self
            .predict_primary(&entry, features, "single_factor")
            .await?;

        let insights = self.model_insights(league, &entry).await;
        Ok(PredictionResult::new(
            main_prediction(probability, &entry.version),
            point_confidence(probability),
            insights,
            metadata(league, request.prediction_type, &entry),
        ))
    }

    async fn evaluate_factor(
        &self,
        league: League,
        entry: &Arc<ModelEntry>,
        index: usize,
        factor: &FactorInput,
    ) -> Result<f64, PredictionError> {
        if factor.input_data.is_empty() {
            return Err(PredictionError::Validation(format!(
                "factor {} has empty input_data",
                index
            )));
        }
        let features = self.extract(league, &factor.input_data);
        self.predict_primary(entry, features, "multi_factor").await
    }

    async fn multi_factor(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let league = request.league;
        let factors = request.effective_factors();
        let (entry, _) = self.ctx.trainer.get_or_train(league, false).await?;

        let outcomes = join_all(
            factors
                .iter()
                .enumerate()
                .map(|(idx, factor)| self.evaluate_factor(league, &entry, idx, factor)),
        )
        .await;

        let mut succeeded: Vec<(usize, f64, f64)> = Vec::new();
        for (idx, (factor, outcome)) in factors.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(probability) => succeeded.push((idx, factor.weight, probability)),
                Err(e) => warn!(
                    "PredictionOrchestrator: {} factor {} skipped: {}",
                    league, idx, e
                ),
            }
        }
        if succeeded.is_empty() {
            return Err(PredictionError::NoValidPredictions {
                attempted: factors.len(),
            });
        }

        let weights = renormalise(&succeeded.iter().map(|s| s.1).collect::<Vec<_>>());
        let contributions: Vec<FactorContribution> = succeeded
            .iter()
            .zip(&weights)
            .map(|((index, _, probability), weight)| FactorContribution {
                index: *index,
                weight: *weight,
                probability: *probability,
                confidence: point_confidence(*probability),
            })
            .collect();

        let probability: f64 = contributions.iter().map(|c| c.weight * c.probability).sum();
        let confidence: f64 = contributions.iter().map(|c| c.weight * c.confidence).sum();
        let skipped = factors.len() - contributions.len();

        let record = self.ctx.trainer.training_record(league);
        let insights = vec![
            Insight::FactorBreakdown {
                factors: contributions,
                skipped,
            },
            insights::model_performance(&entry, record.as_ref()),
        ];
        Ok(PredictionResult::new(
            main_prediction(probability, &entry.version),
            confidence,
            insights,
            metadata(league, request.prediction_type, &entry),
        ))
    }

    async fn real_time(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let league = request.league;
        let (entry, _) = self.ctx.trainer.get_or_train(league, false).await?;
        let features = self.extract(league, &request.input_data);
        let outcome = request.input_data.get("outcome").and_then(parse_outcome);

        self.ctx.streams.enqueue(
            league,
            StreamItem {
                features: features.clone(),
                outcome,
            },
        );

        let mut flushed = 0;
        if let Some(batch) = self.ctx.streams.take_batch_if_due(league) {
            let (x, y): (Vec<FeatureVector>, Vec<f64>) = batch
                .into_iter()
                .filter_map(|item| item.outcome.map(|o| (item.features, o)))
                .unzip();
            if !x.is_empty() {
                let labelled = x.len();
                let model = entry.clone();
                match run_blocking(
                    self.ctx.trainer.estimator_timeout(),
                    "streaming_update",
                    move || model.partial_fit_streaming(&x, &y),
                )
                .await
                {
                    Ok(()) => {
                        flushed = labelled;
                        info!(
                            "PredictionOrchestrator: {} streaming model updated with {} items",
                            league, labelled
                        );
                    }
                    Err(e) => warn!(
                        "PredictionOrchestrator: {} streaming update failed: {}",
                        league, e
                    ),
                }
            }
        }

        let queue_depth = self.ctx.streams.depth(league);
        self.ctx
            .metrics
            .set_stream_queue_depth(league.slug(), queue_depth);
        let streaming = Insight::Streaming {
            queue_depth,
            flushed,
        };

        if !entry.streaming_is_fitted() {
            debug!(
                "PredictionOrchestrator: {} streaming model not fitted, using primary",
                league
            );
            let probability = self.predict_primary(&entry, features, "real_time").await?;
            let mut insights = self.model_insights(league, &entry).await;
            insights.push(streaming);
            return Ok(PredictionResult::new(
                main_prediction(probability, &entry.version),
                point_confidence(probability),
                insights,
                metadata(league, request.prediction_type, &entry),
            ));
        }

        let model = entry.clone();
        let probability = run_blocking(
            self.ctx.trainer.estimator_timeout(),
            "real_time",
            move || model.predict_streaming(&features),
        )
        .await?;

        Ok(PredictionResult::new(
            main_prediction(probability, &entry.version),
            point_confidence(probability),
            vec![streaming],
            metadata(league, request.prediction_type, &entry),
        ))
    }

    async fn advanced(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let league = request.league;
        let (entry, _) = self.ctx.trainer.get_or_train(league, false).await?;
        let features = self.extract(league, &request.input_data);
        let deadline = self.ctx.trainer.estimator_timeout();

        let (primary, ensemble, streaming) = {
            let (m1, f1) = (entry.clone(), features.clone());
            let (m2, f2) = (entry.clone(), features.clone());
            let (m3, f3) = (entry.clone(), features);
            tokio::join!(
                run_blocking(deadline, "advanced.primary", move || m1.predict_primary(&f1)),
                run_blocking(deadline, "advanced.ensemble", move || m2.predict_ensemble(&f2)),
                run_blocking(deadline, "advanced.streaming", move || m3.predict_streaming(&f3)),
            )
        };

        let mut succeeded: Vec<(&str, f64, f64)> = Vec::new();
        for ((component, weight), outcome) in ADVANCED_WEIGHTS.iter().zip([primary, ensemble, streaming]) {
            match outcome {
                Ok(probability) => succeeded.push((*component, *weight, probability)),
                Err(e) => warn!(
                    "PredictionOrchestrator: {} advanced component {} failed: {}",
                    league, component, e
                ),
            }
        }
        if succeeded.is_empty() {
            return Err(PredictionError::NoValidPredictions {
                attempted: ADVANCED_WEIGHTS.len(),
            });
        }

        let weights = renormalise(&succeeded.iter().map(|s| s.1).collect::<Vec<_>>());
        let components: Vec<ComponentContribution> = succeeded
            .iter()
            .zip(&weights)
            .map(|((component, _, probability), weight)| ComponentContribution {
                component: component.to_string(),
                weight: *weight,
                probability: *probability,
            })
            .collect();

        let probability: f64 = components.iter().map(|c| c.weight * c.probability).sum();
        let probabilities: Vec<f64> = components.iter().map(|c| c.probability).collect();
        let (confidence, spread) = agreement_confidence(&probabilities);

        let mut insights = vec![Insight::ComponentBreakdown { components, spread }];
        insights.push(insights::feature_importance(&entry, TOP_FEATURES));
        Ok(PredictionResult::new(
            main_prediction(probability, &entry.version),
            confidence,
            insights,
            metadata(league, request.prediction_type, &entry),
        ))
    }

    async fn health_check(&self, league: League) -> Result<PredictionResult, PredictionError> {
        let statuses = self.ctx.breakers.get_all_statuses().await;
        let degraded = statuses.values().any(|s| s.state == CircuitState::Open);
        let trained: Vec<&str> = self
            .ctx
            .trainer
            .scheduler()
            .trained_leagues()
            .iter()
            .map(|l| l.code())
            .collect();
        let model = self.ctx.trainer.model(league);

        self.ctx
            .metrics
            .inc_predictions(league.slug(), PredictionType::HealthCheck.as_str(), "health");

        Ok(PredictionResult::new(
            json!({
                "status": if degraded { "degraded" } else { "healthy" },
                "circuit_breakers": statuses,
                "trained_leagues": trained,
                "model_loaded": model.is_some(),
                "prediction_cache_entries": self.ctx.cache.len(),
            }),
            if degraded { 50.0 } else { 100.0 },
            Vec::new(),
            PredictionMetadata {
                request_id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                league,
                prediction_type: PredictionType::HealthCheck,
                model_version: model
                    .map(|m| m.version.clone())
                    .unwrap_or_else(|| "untrained".to_string()),
                data_point_count: 0,
                cached: false,
            },
        ))
    }
}

fn main_prediction(probability: f64, model_version: &str) -> Value {
    let win = probability >= 0.5;
    json!({
        "prediction": if win { 1 } else { 0 },
        "probability": probability,
        "label": if win { "win" } else { "loss" },
        "model_version": model_version,
    })
}

fn metadata(league: League, prediction_type: PredictionType, entry: &ModelEntry) -> PredictionMetadata {
    PredictionMetadata {
        request_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        league,
        prediction_type,
        model_version: entry.version.clone(),
        data_point_count: entry.training_samples,
        cached: false,
    }
}

/// Distance from a coin flip, as a percentage
pub fn point_confidence(probability: f64) -> f64 {
    probability.max(1.0 - probability) * 100.0
}

/// Scale weights to sum to 1. A zero total falls back to equal weights.
pub fn renormalise(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if weights.is_empty() {
        return Vec::new();
    }
    if total <= 0.0 {
        let equal = 1.0 / weights.len() as f64;
        return vec![equal; weights.len()];
    }
    weights.iter().map(|w| w / total).collect()
}

/// Confidence from agreement between component probabilities:
/// `100 * (1 - std/mean)`, clamped. Returns `(confidence, std)`.
pub fn agreement_confidence(probabilities: &[f64]) -> (f64, f64) {
    let data = Data::new(probabilities.to_vec());
    let mean = data.mean().unwrap_or(0.0);
    let std = data
        .std_dev()
        .filter(|s| s.is_finite())
        .unwrap_or(0.0);
    if mean.is_nan() || mean <= 0.0 {
        return (0.0, std);
    }
    ((100.0 * (1.0 - std / mean)).clamp(0.0, 100.0), std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renormalise() {
        let w = renormalise(&[0.4, 0.4]);
        assert!((w[0] - 0.5).abs() < 1e-9);
        assert!((w[1] - 0.5).abs() < 1e-9);

        let w = renormalise(&[0.0, 0.0, 0.0]);
        assert!(w.iter().all(|x| (x - 1.0 / 3.0).abs() < 1e-9));

        assert!(renormalise(&[]).is_empty());
    }

    #[test]
    fn test_agreement_confidence() {
        let (confidence, spread) = agreement_confidence(&[0.6, 0.6, 0.6]);
        assert!((confidence - 100.0).abs() < 1e-9);
        assert!(spread.abs() < 1e-9);

        let (confidence, _) = agreement_confidence(&[0.2, 0.8]);
        assert!(confidence < 100.0);
        assert!(confidence >= 0.0);

        assert_eq!(agreement_confidence(&[0.0, 0.0]).0, 0.0);
    }

    #[test]
    fn test_single_component_agreement() {
        let (confidence, spread) = agreement_confidence(&[0.7]);
        assert!((0.0..=100.0).contains(&confidence));
        assert!(spread.is_finite());
    }

    #[test]
    fn test_point_confidence() {
        assert!((point_confidence(0.8) - 80.0).abs() < 1e-9);
        assert!((point_confidence(0.2) - 80.0).abs() < 1e-9);
        assert!((point_confidence(0.5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_response_serialises_untagged() {
        let err = PredictionError::Validation("bad".into());
        let response = PredictionResponse::Err(ErrorResult::from_error(&err, json!({"x": 1})));
        let rendered = response.to_json();
        assert_eq!(rendered["error"], true);
        assert_eq!(rendered["kind"], "validation_error");
        assert!(!response.is_ok());
    }
}
