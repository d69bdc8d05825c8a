use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of evaluations kept per league
pub const PERFORMANCE_HISTORY_LEN: usize = 3;

/// Holdout metrics of one training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl PerformanceMetrics {
    /// Binary classification metrics with 1.0 as the positive class.
    /// Undefined ratios (no predicted or no actual positives) are 0.0.
    pub fn from_labels(predicted: &[f64], actual: &[f64]) -> Self {
        let n = predicted.len().min(actual.len());
        if n == 0 {
            return Self {
                accuracy: 0.0,
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
            };
        }

        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        for (p, a) in predicted.iter().zip(actual.iter()).take(n) {
            let p = *p >= 0.5;
            let a = *a >= 0.5;
            if p == a {
                correct += 1;
            }
            match (p, a) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }

        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: correct as f64 / n as f64,
            precision,
            recall,
            f1,
        }
    }
}

/// Bounded most-recent-last history of evaluations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    records: VecDeque<PerformanceMetrics>,
}

impl PerformanceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: PerformanceMetrics) {
        self.records.push_back(metrics);
        while self.records.len() > PERFORMANCE_HISTORY_LEN {
            self.records.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&PerformanceMetrics> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mean over the kept window
    pub fn rolling_mean(&self) -> Option<PerformanceMetrics> {
        if self.records.is_empty() {
            return None;
        }
        let n = self.records.len() as f64;
        let sum = self.records.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, m| {
            (
                acc.0 + m.accuracy,
                acc.1 + m.precision,
                acc.2 + m.recall,
                acc.3 + m.f1,
            )
        });
        Some(PerformanceMetrics {
            accuracy: sum.0 / n,
            precision: sum.1 / n,
            recall: sum.2 / n,
            f1: sum.3 / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_from_labels() {
        let predicted = [1.0, 1.0, 0.0, 0.0];
        let actual = [1.0, 0.0, 0.0, 1.0];
        let m = PerformanceMetrics::from_labels(&predicted, &actual);
        assert!((m.accuracy - 0.5).abs() < 1e-9);
        assert!((m.precision - 0.5).abs() < 1e-9);
        assert!((m.recall - 0.5).abs() < 1e-9);
        assert!((m.f1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_positive_predictions() {
        let m = PerformanceMetrics::from_labels(&[0.0, 0.0], &[1.0, 0.0]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1, 0.0);
        assert!((m.accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = PerformanceHistory::new();
        for i in 0..5 {
            history.push(PerformanceMetrics {
                accuracy: i as f64 / 10.0,
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
            });
        }
        assert_eq!(history.len(), PERFORMANCE_HISTORY_LEN);
        assert!((history.latest().unwrap().accuracy - 0.4).abs() < 1e-9);
        let mean = history.rolling_mean().unwrap();
        assert!((mean.accuracy - 0.3).abs() < 1e-9);
    }
}
