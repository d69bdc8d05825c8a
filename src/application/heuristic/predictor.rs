//! Stand-alone heuristic scoring of free-text factors.
//!
//! No trained model involved: features come from the text alone and are
//! combined by a fixed logistic score. Results are kept in the file cache.

use crate::domain::league::League;
use crate::domain::ml::FEATURE_NAMES;
use crate::domain::ports::{FeatureContext, FeatureExtractor};
use crate::domain::prediction::InputData;
use crate::infrastructure::cache::FileCache;
use crate::infrastructure::nlp::HeuristicFeatureExtractor;
use anyhow::Result;
use serde_json::{Map, Value, json};
use tracing::info;

/// Feature weights of the logistic score
const WEIGHTS: &[(&str, f64)] = &[
    ("sentiment", 1.2),
    ("win_pct", 1.5),
    ("opponent_win_pct", -1.5),
    ("recent_form", 1.0),
    ("injuries", -0.8),
    ("is_home", 0.3),
    ("direction", 0.25),
];

/// Centres the default feature values (form 0.5) on a probability of 0.5
const BIAS: f64 = -0.5;

/// Result of one heuristic lookup
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicOutcome {
    pub document: Value,
    pub from_cache: bool,
}

pub struct HeuristicPredictor {
    cache: FileCache,
    extractor: HeuristicFeatureExtractor,
}

impl HeuristicPredictor {
    pub fn new(cache: FileCache) -> Self {
        Self {
            cache,
            extractor: HeuristicFeatureExtractor::new(),
        }
    }

    /// Cached document for `(factor, league)`, computing and caching it on a miss
    pub fn predict(&self, factor: &str, league: League) -> Result<HeuristicOutcome> {
        if let Some(document) = self.cache.get(factor, league.code()) {
            return Ok(HeuristicOutcome {
                document,
                from_cache: true,
            });
        }

        let document = self.score(factor, league);
        let stamped = self.cache.set(factor, league.code(), &document)?;
        info!(
            "HeuristicPredictor: Scored '{}' for {} (p={})",
            factor, league, document["probability"]
        );
        Ok(HeuristicOutcome {
            document: stamped,
            from_cache: false,
        })
    }

    /// Score a factor without touching the cache
    pub fn score(&self, factor: &str, league: League) -> Value {
        let mut input = InputData::new();
        input.insert("factor".to_string(), Value::String(factor.to_string()));
        let features = self
            .extractor
            .extract(&input, &FeatureContext::for_league(league));

        let z = WEIGHTS.iter().fold(BIAS, |acc, (name, weight)| {
            acc + weight * features.get(name).unwrap_or(0.0)
        });
        let probability = logistic(z);

        let named: Map<String, Value> = FEATURE_NAMES
            .iter()
            .zip(features.as_slice())
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();

        json!({
            "factor": factor,
            "league": league.code(),
            "probability": probability,
            "prediction": if probability >= 0.5 { 1 } else { 0 },
            "confidence": probability.max(1.0 - probability) * 100.0,
            "features": named,
            "source": "heuristic",
        })
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
