use crate::domain::errors::EstimatorError;
use crate::domain::ml::feature_registry::FeatureVector;

/// Binary-outcome model capability.
///
/// Labels are 0.0 / 1.0; `predict_proba` returns `[p(0), p(1)]`.
pub trait Estimator: Send + Sync {
    fn fit(&mut self, features: &[FeatureVector], target: &[f64]) -> Result<(), EstimatorError>;

    fn predict(&self, features: &FeatureVector) -> Result<f64, EstimatorError> {
        let proba = self.predict_proba(features)?;
        Ok(if proba[1] >= 0.5 { 1.0 } else { 0.0 })
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], EstimatorError>;

    fn is_fitted(&self) -> bool;

    /// Get model name/type
    fn name(&self) -> &str;
}

/// Estimator that can learn incrementally from mini-batches
pub trait StreamingEstimator: Estimator {
    fn partial_fit(
        &mut self,
        features_batch: &[FeatureVector],
        target_batch: &[f64],
    ) -> Result<(), EstimatorError>;
}

pub(crate) fn check_training_shape(
    features: &[FeatureVector],
    target: &[f64],
) -> Result<(), EstimatorError> {
    if features.is_empty() {
        return Err(EstimatorError::InvalidData("empty training set".to_string()));
    }
    if features.len() != target.len() {
        return Err(EstimatorError::InvalidData(format!(
            "{} feature rows but {} targets",
            features.len(),
            target.len()
        )));
    }
    Ok(())
}
