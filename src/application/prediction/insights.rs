use crate::application::training::{GameRow, ModelEntry, TrainingRecord};
use crate::domain::prediction::Insight;

const TREND_DELTA: f64 = 0.1;

/// Win rate over labelled games (newest first) and its direction, comparing
/// the newer half against the older half.
pub fn historical_trend(games: &[GameRow]) -> Insight {
    let outcomes: Vec<f64> = games.iter().filter_map(|g| g.outcome).collect();
    if outcomes.is_empty() {
        return Insight::HistoricalTrend {
            games: 0,
            win_rate: 0.0,
            trend: "insufficient_data".to_string(),
        };
    }

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let win_rate = mean(&outcomes);

    let trend = if outcomes.len() < 4 {
        "insufficient_data"
    } else {
        let (recent, older) = outcomes.split_at(outcomes.len() / 2);
        let delta = mean(recent) - mean(older);
        if delta > TREND_DELTA {
            "improving"
        } else if delta < -TREND_DELTA {
            "declining"
        } else {
            "stable"
        }
    };

    Insight::HistoricalTrend {
        games: outcomes.len(),
        win_rate,
        trend: trend.to_string(),
    }
}

/// Rolling holdout metrics, falling back to the entry's own evaluation
pub fn model_performance(entry: &ModelEntry, record: Option<&TrainingRecord>) -> Insight {
    let metrics = record
        .and_then(|r| r.recent_performance.rolling_mean())
        .unwrap_or(entry.metrics);
    Insight::ModelPerformance {
        accuracy: metrics.accuracy,
        precision: metrics.precision,
        recall: metrics.recall,
        f1: metrics.f1,
    }
}

pub fn feature_importance(entry: &ModelEntry, top: usize) -> Insight {
    Insight::FeatureImportance {
        top: entry.top_features(top),
    }
}
