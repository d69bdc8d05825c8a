use serde::{Deserialize, Serialize};

/// Ordered list of feature names.
/// Estimators are fitted against this exact order; changing it invalidates trained models.
pub const FEATURE_NAMES: &[&str] = &[
    "score_norm",
    "is_home",
    "rest_days",
    "win_pct",
    "opponent_win_pct",
    "recent_form",
    "injuries",
    "line_norm",
    "direction",
    "sentiment",
    "stat_mean_norm",
    "numeric_count",
];

pub const FEATURE_COUNT: usize = 12;

/// Dense feature vector in `FEATURE_NAMES` order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// Build from raw values. Non-finite entries are replaced by 0.0 and the
    /// vector is padded or truncated to `FEATURE_COUNT`.
    pub fn new(mut values: Vec<f64>) -> Self {
        values.resize(FEATURE_COUNT, 0.0);
        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        Self(values)
    }

    pub fn zeros() -> Self {
        Self(vec![0.0; FEATURE_COUNT])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        index_of(name).map(|i| self.0[i])
    }

    pub fn set(&mut self, name: &str, value: f64) {
        if let Some(i) = index_of(name) {
            self.0[i] = if value.is_finite() { value } else { 0.0 };
        }
    }
}

pub fn index_of(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_length() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        assert_eq!(FeatureVector::zeros().len(), FEATURE_COUNT);
        assert_eq!(FeatureVector::new(vec![1.0, 2.0]).len(), FEATURE_COUNT);
    }

    #[test]
    fn test_non_finite_values_are_zeroed() {
        let fv = FeatureVector::new(vec![f64::NAN, f64::INFINITY, 0.5]);
        assert_eq!(fv.as_slice()[0], 0.0);
        assert_eq!(fv.as_slice()[1], 0.0);
        assert_eq!(fv.as_slice()[2], 0.5);
    }

    #[test]
    fn test_named_access() {
        let mut fv = FeatureVector::zeros();
        fv.set("sentiment", 0.7);
        assert_eq!(fv.get("sentiment"), Some(0.7));
        assert_eq!(fv.get("unknown"), None);
    }
}
