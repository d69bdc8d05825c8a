use crate::domain::errors::PredictionError;
use crate::domain::league::League;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Raw caller-supplied attributes of a prediction ("team", "points", "factor", ...)
pub type InputData = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    SingleFactor,
    MultiFactor,
    RealTime,
    Advanced,
    HealthCheck,
}

impl PredictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::SingleFactor => "single_factor",
            PredictionType::MultiFactor => "multi_factor",
            PredictionType::RealTime => "real_time",
            PredictionType::Advanced => "advanced",
            PredictionType::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PredictionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single_factor" => Ok(PredictionType::SingleFactor),
            "multi_factor" => Ok(PredictionType::MultiFactor),
            "real_time" => Ok(PredictionType::RealTime),
            "advanced" => Ok(PredictionType::Advanced),
            "health_check" => Ok(PredictionType::HealthCheck),
            other => Err(format!(
                "Unsupported prediction_type: {}. Must be one of single_factor, multi_factor, real_time, advanced, health_check",
                other
            )),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// One weighted factor of a multi-factor request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorInput {
    pub input_data: InputData,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// A validated prediction request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub league: League,
    pub prediction_type: PredictionType,
    pub input_data: InputData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<Vec<FactorInput>>,
}

/// Wire shape before validation. Every field is optional so that
/// a missing field surfaces as a validation error instead of a parse error.
#[derive(Debug, Deserialize)]
struct RawPredictionRequest {
    league: Option<String>,
    prediction_type: Option<String>,
    input_data: Option<Value>,
    factors: Option<Vec<FactorInput>>,
}

impl PredictionRequest {
    pub fn new(league: League, prediction_type: PredictionType, input_data: InputData) -> Self {
        Self {
            league,
            prediction_type,
            input_data,
            factors: None,
        }
    }

    pub fn with_factors(mut self, factors: Vec<FactorInput>) -> Self {
        self.factors = Some(factors);
        self
    }

    /// Parse and validate an untyped JSON request.
    pub fn from_json(raw: &Value) -> Result<Self, PredictionError> {
        let parsed: RawPredictionRequest = serde_json::from_value(raw.clone())
            .map_err(|e| PredictionError::Validation(format!("Malformed request: {}", e)))?;

        let league_str = parsed
            .league
            .ok_or_else(|| PredictionError::Validation("Missing field: league".to_string()))?;
        let league = League::from_str(&league_str).map_err(PredictionError::Validation)?;

        let type_str = parsed.prediction_type.ok_or_else(|| {
            PredictionError::Validation("Missing field: prediction_type".to_string())
        })?;
        let prediction_type =
            PredictionType::from_str(&type_str).map_err(PredictionError::Validation)?;

        let input_data = match parsed.input_data {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(PredictionError::Validation(
                    "input_data must be an object".to_string(),
                ));
            }
            None => {
                return Err(PredictionError::Validation(
                    "Missing field: input_data".to_string(),
                ));
            }
        };

        let request = Self {
            league,
            prediction_type,
            input_data,
            factors: parsed.factors,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check the invariants a typed request can still violate.
    pub fn validate(&self) -> Result<(), PredictionError> {
        if self.input_data.is_empty() {
            return Err(PredictionError::Validation(
                "input_data must not be empty".to_string(),
            ));
        }
        if let Some(factors) = &self.factors {
            for (idx, factor) in factors.iter().enumerate() {
                if !factor.weight.is_finite() || factor.weight < 0.0 {
                    return Err(PredictionError::Validation(format!(
                        "factor {} has invalid weight {}",
                        idx, factor.weight
                    )));
                }
            }
        }
        Ok(())
    }

    /// Factors to evaluate for a multi-factor request. A request without an
    /// explicit list is treated as a single factor of weight 1.0.
    pub fn effective_factors(&self) -> Vec<FactorInput> {
        match &self.factors {
            Some(factors) if !factors.is_empty() => factors.clone(),
            _ => vec![FactorInput {
                input_data: self.input_data.clone(),
                weight: 1.0,
            }],
        }
    }
}

/// Model metadata attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetadata {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub league: League,
    pub prediction_type: PredictionType,
    pub model_version: String,
    pub data_point_count: usize,
    #[serde(default)]
    pub cached: bool,
}

/// Per-factor contribution in a multi-factor result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub index: usize,
    pub weight: f64,
    pub probability: f64,
    pub confidence: f64,
}

/// Per-model contribution in an advanced (ensemble) result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentContribution {
    pub component: String,
    pub weight: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    FeatureImportance {
        top: Vec<(String, f64)>,
    },
    HistoricalTrend {
        games: usize,
        win_rate: f64,
        trend: String,
    },
    ModelPerformance {
        accuracy: f64,
        precision: f64,
        recall: f64,
        f1: f64,
    },
    FactorBreakdown {
        factors: Vec<FactorContribution>,
        skipped: usize,
    },
    ComponentBreakdown {
        components: Vec<ComponentContribution>,
        spread: f64,
    },
    Streaming {
        queue_depth: usize,
        flushed: usize,
    },
}

/// The successful outcome of a request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub main_prediction: Value,
    pub confidence_score: f64,
    pub insights: Vec<Insight>,
    pub metadata: PredictionMetadata,
}

impl PredictionResult {
    pub fn new(
        main_prediction: Value,
        confidence_score: f64,
        insights: Vec<Insight>,
        metadata: PredictionMetadata,
    ) -> Self {
        Self {
            main_prediction,
            confidence_score: clamp_confidence(confidence_score),
            insights,
            metadata,
        }
    }

    /// Probability carried by `main_prediction`, if it has one
    pub fn probability(&self) -> Option<f64> {
        self.main_prediction
            .get("probability")
            .and_then(Value::as_f64)
    }

    /// Copy of this result flagged as served from cache
    pub fn as_cached(&self) -> Self {
        let mut copy = self.clone();
        copy.metadata.cached = true;
        copy
    }
}

/// Clamp into [0, 100]; NaN collapses to 0.
pub fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}
