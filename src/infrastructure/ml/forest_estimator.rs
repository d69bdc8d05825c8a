use crate::domain::errors::EstimatorError;
use crate::domain::ml::estimator::check_training_shape;
use crate::domain::ml::{Estimator, FEATURE_COUNT, FeatureVector};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::debug;

/// Random forest hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
}

impl ForestParams {
    pub fn new(n_trees: u16, max_depth: u16) -> Self {
        Self {
            n_trees: n_trees.max(1) as usize,
            max_depth: max_depth.max(1),
            min_samples_split: 2,
        }
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::new(50, 6)
    }
}

/// Binary classifier backed by a smartcore random forest regressor.
///
/// The forest is fitted on a 0/1 target, so its output is read as p(1).
pub struct ForestEstimator {
    name: String,
    params: ForestParams,
    model: Option<RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl ForestEstimator {
    pub fn new(name: impl Into<String>, params: ForestParams) -> Self {
        Self {
            name: name.into(),
            params,
            model: None,
        }
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    /// Batch p(1) for many rows with a single matrix build
    pub fn predict_many(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, EstimatorError> {
        let model = self.model.as_ref().ok_or(EstimatorError::NotFitted)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(rows)?;
        let predictions = model
            .predict(&matrix)
            .map_err(|e| EstimatorError::Backend(format!("Prediction failed: {}", e)))?;
        Ok(predictions.into_iter().map(|p| p.clamp(0.0, 1.0)).collect())
    }
}

fn to_matrix(rows: &[FeatureVector]) -> Result<DenseMatrix<f64>, EstimatorError> {
    let data: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| {
            if r.len() != FEATURE_COUNT {
                Err(EstimatorError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: r.len(),
                })
            } else {
                Ok(r.to_vec())
            }
        })
        .collect::<Result<_, _>>()?;
    DenseMatrix::from_2d_vec(&data)
        .map_err(|e| EstimatorError::Backend(format!("Matrix creation failed: {}", e)))
}

impl Estimator for ForestEstimator {
    fn fit(&mut self, features: &[FeatureVector], target: &[f64]) -> Result<(), EstimatorError> {
        check_training_shape(features, target)?;
        let matrix = to_matrix(features)?;
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees)
            .with_max_depth(self.params.max_depth)
            .with_min_samples_split(self.params.min_samples_split);

        let model = RandomForestRegressor::fit(&matrix, &target.to_vec(), params)
            .map_err(|e| EstimatorError::Backend(format!("Training error: {}", e)))?;
        debug!(
            "{}: fitted {} trees on {} rows",
            self.name,
            self.params.n_trees,
            features.len()
        );
        self.model = Some(model);
        Ok(())
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], EstimatorError> {
        let p = self
            .predict_many(std::slice::from_ref(features))?
            .first()
            .copied()
            .ok_or_else(|| EstimatorError::Backend("No prediction returned".to_string()))?;
        Ok([1.0 - p, p])
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
