//! Training rows: stored game documents, cold-start synthetic rows and the
//! holdout split.

use crate::domain::league::League;
use crate::domain::ml::FeatureVector;
use crate::domain::prediction::InputData;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};

/// Collection holding historical games
pub const GAMES_COLLECTION: &str = "games";

/// Rows generated when a league has too little stored history
pub const COLD_START_ROWS: usize = 200;

/// One stored game: raw attributes plus an optional 0/1 outcome
#[derive(Debug, Clone, PartialEq)]
pub struct GameRow {
    pub league: League,
    pub timestamp: i64,
    pub input_data: InputData,
    pub outcome: Option<f64>,
}

impl GameRow {
    /// Parse a stored document. Documents without an `input_data` object use
    /// their remaining top-level fields as attributes.
    pub fn from_document(league: League, doc: &Value) -> Option<Self> {
        let obj = doc.as_object()?;
        let input_data = match obj.get("input_data") {
            Some(Value::Object(map)) => map.clone(),
            _ => obj
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "league" | "timestamp" | "outcome"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        Some(Self {
            league,
            timestamp: obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
            outcome: obj.get("outcome").and_then(parse_outcome),
            input_data,
        })
    }

    pub fn to_document(&self) -> Value {
        json!({
            "league": self.league,
            "timestamp": self.timestamp,
            "input_data": Value::Object(self.input_data.clone()),
            "outcome": self.outcome,
        })
    }
}

/// 0/1 label from a number, bool or W/L-style string
pub fn parse_outcome(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| if v >= 0.5 { 1.0 } else { 0.0 }),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "w" | "win" | "true" | "yes" | "over" => Some(1.0),
            "0" | "l" | "loss" | "false" | "no" | "under" => Some(0.0),
            _ => None,
        },
        _ => None,
    }
}

/// Deterministic synthetic rows for a league without enough history.
///
/// The label follows a noisy linear rule over team strength, form, venue,
/// sentiment and injuries, so the fitted models have something to learn.
pub fn synthetic_rows(league: League, rows: usize, seed: u64) -> (Vec<FeatureVector>, Vec<f64>) {
    let league_offset = League::ALL
        .iter()
        .position(|l| *l == league)
        .unwrap_or(0) as u64;
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(league_offset));

    let mut features = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);
    for _ in 0..rows {
        let win_pct = rng.random_range(0.2..0.8);
        let opponent_win_pct = rng.random_range(0.2..0.8);
        let recent_form = rng.random_range(0.0..1.0);
        let is_home = if rng.random_bool(0.5) { 1.0 } else { 0.0 };
        let injuries = rng.random_range(0.0..0.6);
        let sentiment = rng.random_range(-0.6..0.6);
        let score_norm = rng.random_range(0.5..1.5);
        let line_norm = rng.random_range(0.5..1.5);
        let direction = [-1.0, 0.0, 1.0][rng.random_range(0..3usize)];

        let latent = 2.5 * (win_pct - opponent_win_pct)
            + 1.2 * (recent_form - 0.5)
            + 0.4 * (is_home - 0.5)
            + 0.8 * sentiment
            - 0.8 * injuries
            + 0.6 * direction * (score_norm - line_norm)
            + rng.random_range(-0.15..0.15);

        let mut fv = FeatureVector::zeros();
        fv.set("score_norm", score_norm);
        fv.set("is_home", is_home);
        fv.set("rest_days", rng.random_range(0.0..1.0));
        fv.set("win_pct", win_pct);
        fv.set("opponent_win_pct", opponent_win_pct);
        fv.set("recent_form", recent_form);
        fv.set("injuries", injuries);
        fv.set("line_norm", line_norm);
        fv.set("direction", direction);
        fv.set("sentiment", sentiment);
        fv.set("stat_mean_norm", (score_norm + line_norm) / 2.0);
        fv.set("numeric_count", rng.random_range(0.0..1.0));

        features.push(fv);
        target.push(if latent > 0.0 { 1.0 } else { 0.0 });
    }
    (features, target)
}

/// Labelled dataset split into train and holdout parts
pub struct SplitDataset {
    pub train_x: Vec<FeatureVector>,
    pub train_y: Vec<f64>,
    pub test_x: Vec<FeatureVector>,
    pub test_y: Vec<f64>,
}

/// Seeded shuffle, then 80/20. Both parts get at least one row when `n >= 2`.
pub fn train_test_split(features: Vec<FeatureVector>, target: Vec<f64>, seed: u64) -> SplitDataset {
    let mut rows: Vec<(FeatureVector, f64)> = features.into_iter().zip(target).collect();
    rows.shuffle(&mut StdRng::seed_from_u64(seed));

    let n = rows.len();
    let test_len = if n >= 2 { (n / 5).max(1) } else { 0 };
    let test = rows.split_off(n - test_len);

    let (train_x, train_y) = rows.into_iter().unzip();
    let (test_x, test_y) = test.into_iter().unzip();
    SplitDataset {
        train_x,
        train_y,
        test_x,
        test_y,
    }
}

/// Build an `InputData` map from string pairs (CSV import)
pub fn input_from_record<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> InputData {
    let mut map = Map::new();
    for (key, raw) in pairs {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let value = if let Ok(n) = raw.parse::<i64>() {
            json!(n)
        } else if let Ok(f) = raw.parse::<f64>() {
            json!(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            json!(b)
        } else {
            json!(raw)
        };
        map.insert(key.trim().to_string(), value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_row_from_nested_document() {
        let doc = json!({
            "league": "NBA",
            "timestamp": 10,
            "input_data": {"win_pct": 0.6},
            "outcome": 1
        });
        let row = GameRow::from_document(League::Nba, &doc).unwrap();
        assert_eq!(row.timestamp, 10);
        assert_eq!(row.outcome, Some(1.0));
        assert_eq!(row.input_data["win_pct"], 0.6);
        assert_eq!(
            GameRow::from_document(League::Nba, &row.to_document()).unwrap(),
            row
        );
    }

    #[test]
    fn test_game_row_from_flat_document() {
        let doc = json!({"league": "NFL", "home": "KC", "outcome": "W"});
        let row = GameRow::from_document(League::Nfl, &doc).unwrap();
        assert_eq!(row.outcome, Some(1.0));
        assert_eq!(row.input_data.len(), 1);
        assert!(GameRow::from_document(League::Nfl, &json!([1, 2])).is_none());
    }

    #[test]
    fn test_synthetic_rows_are_seeded_and_balanced() {
        let (x1, y1) = synthetic_rows(League::Nba, 200, 42);
        let (x2, y2) = synthetic_rows(League::Nba, 200, 42);
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);

        let positives = y1.iter().filter(|y| **y == 1.0).count();
        assert!(positives > 40 && positives < 160, "positives = {}", positives);

        let (x3, _) = synthetic_rows(League::Nfl, 200, 42);
        assert_ne!(x1, x3);
    }

    #[test]
    fn test_split_sizes() {
        let (x, y) = synthetic_rows(League::Mlb, 50, 1);
        let split = train_test_split(x, y, 7);
        assert_eq!(split.train_x.len(), 40);
        assert_eq!(split.test_x.len(), 10);
        assert_eq!(split.train_x.len(), split.train_y.len());
    }

    #[test]
    fn test_input_from_record_types_values() {
        let input = input_from_record([("wins", "10"), ("pct", "0.6"), ("home", "true"), ("team", "BOS"), ("x", "")]);
        assert_eq!(input["wins"], 10);
        assert_eq!(input["pct"], 0.6);
        assert_eq!(input["home"], true);
        assert_eq!(input["team"], "BOS");
        assert!(!input.contains_key("x"));
    }
}
