use crate::domain::errors::EstimatorError;
use crate::domain::ml::estimator::check_training_shape;
use crate::domain::ml::{Estimator, FEATURE_COUNT, FeatureVector, StreamingEstimator};

const DEFAULT_LEARNING_RATE: f64 = 0.05;
const FIT_EPOCHS: usize = 20;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Online logistic regression updated by SGD with a decaying learning rate.
///
/// `fit` resets the weights and runs several epochs; `partial_fit` applies a
/// single pass over the batch on top of the current weights.
#[derive(Debug, Clone)]
pub struct OnlineLogisticEstimator {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    updates: u64,
}

impl OnlineLogisticEstimator {
    pub fn new() -> Self {
        Self::with_learning_rate(DEFAULT_LEARNING_RATE)
    }

    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            weights: vec![0.0; FEATURE_COUNT],
            bias: 0.0,
            learning_rate,
            updates: 0,
        }
    }

    /// Number of single-sample updates applied so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features.as_slice())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    fn step(&mut self, features: &FeatureVector, target: f64) {
        let err = target - sigmoid(self.score(features));
        self.updates = self.updates.saturating_add(1);
        let lr = self.learning_rate / (1.0 + (self.updates as f64).sqrt() * 0.1);
        self.bias += lr * err;
        for (w, x) in self.weights.iter_mut().zip(features.as_slice()) {
            *w += lr * err * x;
        }
    }

    fn check_dims(features: &FeatureVector) -> Result<(), EstimatorError> {
        if features.len() != FEATURE_COUNT {
            return Err(EstimatorError::DimensionMismatch {
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

impl Default for OnlineLogisticEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for OnlineLogisticEstimator {
    fn fit(&mut self, features: &[FeatureVector], target: &[f64]) -> Result<(), EstimatorError> {
        check_training_shape(features, target)?;
        *self = Self::with_learning_rate(self.learning_rate);
        for _ in 0..FIT_EPOCHS {
            self.partial_fit(features, target)?;
        }
        Ok(())
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], EstimatorError> {
        if !self.is_fitted() {
            return Err(EstimatorError::NotFitted);
        }
        Self::check_dims(features)?;
        let p = sigmoid(self.score(features));
        Ok([1.0 - p, p])
    }

    fn is_fitted(&self) -> bool {
        self.updates > 0
    }

    fn name(&self) -> &str {
        "online_logistic"
    }
}

impl StreamingEstimator for OnlineLogisticEstimator {
    fn partial_fit(
        &mut self,
        features_batch: &[FeatureVector],
        target_batch: &[f64],
    ) -> Result<(), EstimatorError> {
        check_training_shape(features_batch, target_batch)?;
        for (x, y) in features_batch.iter().zip(target_batch) {
            Self::check_dims(x)?;
            self.step(x, y.clamp(0.0, 1.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: f64) -> FeatureVector {
        let mut fv = FeatureVector::zeros();
        fv.set("win_pct", v);
        fv.set("direction", v * 2.0 - 1.0);
        fv
    }

    #[test]
    fn test_unfitted() {
        let est = OnlineLogisticEstimator::new();
        assert_eq!(est.predict_proba(&row(0.5)), Err(EstimatorError::NotFitted));
    }

    #[test]
    fn test_partial_fit_moves_towards_labels() {
        let mut est = OnlineLogisticEstimator::new();
        let x: Vec<FeatureVector> = (0..50).map(|i| row(if i % 2 == 0 { 1.0 } else { 0.0 })).collect();
        let y: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();

        est.partial_fit(&x, &y).unwrap();
        assert_eq!(est.updates(), 50);
        let hi = est.predict_proba(&row(1.0)).unwrap()[1];
        let lo = est.predict_proba(&row(0.0)).unwrap()[1];
        assert!(hi > lo);
    }

    #[test]
    fn test_fit_resets_state() {
        let mut est = OnlineLogisticEstimator::new();
        let x = vec![row(1.0), row(0.0)];
        let y = vec![1.0, 0.0];
        est.fit(&x, &y).unwrap();
        assert_eq!(est.updates(), (FIT_EPOCHS * 2) as u64);
        est.fit(&x, &y).unwrap();
        assert_eq!(est.updates(), (FIT_EPOCHS * 2) as u64);
        assert_eq!(est.predict(&row(1.0)).unwrap(), 1.0);
    }
}
