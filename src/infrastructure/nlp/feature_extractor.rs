//! Heuristic feature extraction from free-form request attributes.
//!
//! Structured keys (`win_pct`, `rest_days`, `line`, ...) win over values
//! parsed from text. Every feature is bounded so unseen inputs stay in the
//! range the estimators were trained on.

use crate::domain::ml::FeatureVector;
use crate::domain::ports::{FeatureContext, FeatureExtractor};
use crate::domain::prediction::InputData;
use crate::infrastructure::nlp::sentiment_analyzer::SentimentAnalyzer;
use serde_json::Value;

const TEXT_KEYS: &[&str] = &["factor", "description", "text", "headline", "notes"];

/// Numbers found in text, in order of appearance
pub fn parse_numbers(text: &str) -> Vec<f64> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .filter_map(|token| {
            let trimmed =
                token.trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'));
            let trimmed = trimmed.trim_end_matches('.');
            if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        })
        .collect()
}

/// +1 for over/win phrasing, -1 for under/lose phrasing, 0 otherwise
pub fn direction_of(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |needle: &[&str]| words.iter().any(|w| needle.contains(w));

    if has(&["under", "fewer", "less", "lose", "loses", "below"]) {
        -1.0
    } else if has(&["over", "more", "win", "wins", "beat", "beats", "above", "exceed", "exceeds"]) {
        1.0
    } else {
        0.0
    }
}

fn number(input: &InputData, key: &str) -> Option<f64> {
    match input.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn text_of(input: &InputData) -> String {
    let mut parts: Vec<&str> = TEXT_KEYS
        .iter()
        .filter_map(|k| input.get(*k).and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        parts = input.values().filter_map(Value::as_str).collect();
    }
    parts.join(" ")
}

fn ratio(value: f64, scale: f64) -> f64 {
    if scale > 0.0 { value / scale } else { 0.0 }
}

/// Mean of a 0/1 (or W/L string) sequence
fn form_of(value: &Value) -> Option<f64> {
    let results: Vec<f64> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                Value::String(s) => match s.to_uppercase().as_str() {
                    "W" => Some(1.0),
                    "L" => Some(0.0),
                    _ => None,
                },
                _ => None,
            })
            .collect(),
        Value::String(s) => s
            .to_uppercase()
            .chars()
            .filter_map(|c| match c {
                'W' => Some(1.0),
                'L' => Some(0.0),
                _ => None,
            })
            .collect(),
        Value::Number(n) => return n.as_f64().map(|v| v.clamp(0.0, 1.0)),
        _ => return None,
    };
    if results.is_empty() {
        None
    } else {
        Some(results.iter().sum::<f64>() / results.len() as f64)
    }
}

/// Feature extractor combining structured keys, text parsing and sentiment
pub struct HeuristicFeatureExtractor {
    sentiment: SentimentAnalyzer,
}

impl HeuristicFeatureExtractor {
    pub fn new() -> Self {
        Self {
            sentiment: SentimentAnalyzer::new(),
        }
    }

    fn win_pct(input: &InputData, prefix: &str) -> Option<f64> {
        if let Some(pct) = number(input, &format!("{}win_pct", prefix)) {
            return Some(pct.clamp(0.0, 1.0));
        }
        let wins = number(input, &format!("{}wins", prefix))?;
        let losses = number(input, &format!("{}losses", prefix))?;
        let games = wins + losses;
        (games > 0.0).then(|| (wins / games).clamp(0.0, 1.0))
    }
}

impl Default for HeuristicFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for HeuristicFeatureExtractor {
    fn extract(&self, raw_input: &InputData, context: &FeatureContext) -> FeatureVector {
        let text = text_of(raw_input);
        let text_numbers = parse_numbers(&text);
        let lower = text.to_lowercase();
        let typical = context.typical_score;

        let mut fv = FeatureVector::zeros();

        let score = number(raw_input, "score")
            .or_else(|| number(raw_input, "points"))
            .or_else(|| text_numbers.first().copied());
        fv.set("score_norm", score.map(|s| ratio(s, typical)).unwrap_or(0.0).clamp(0.0, 5.0));

        let is_home = number(raw_input, "is_home").unwrap_or_else(|| {
            if lower.contains(" at home") || lower.contains("home game") {
                1.0
            } else {
                0.0
            }
        });
        fv.set("is_home", is_home.clamp(0.0, 1.0));

        let rest = number(raw_input, "rest_days").unwrap_or(1.0);
        fv.set("rest_days", (rest / 7.0).clamp(0.0, 1.0));

        fv.set("win_pct", Self::win_pct(raw_input, "").unwrap_or(0.5));
        fv.set(
            "opponent_win_pct",
            Self::win_pct(raw_input, "opponent_").unwrap_or(0.5),
        );

        let form = raw_input
            .get("recent_form")
            .or_else(|| raw_input.get("last_results"))
            .and_then(form_of)
            .unwrap_or(0.5);
        fv.set("recent_form", form);

        let injuries = match raw_input.get("injuries") {
            Some(Value::Array(items)) => items.len() as f64,
            _ => number(raw_input, "injuries").unwrap_or(0.0),
        };
        fv.set("injuries", (injuries / 5.0).clamp(0.0, 1.0));

        let line = number(raw_input, "line").or_else(|| text_numbers.last().copied());
        fv.set("line_norm", line.map(|l| ratio(l, typical)).unwrap_or(0.0).clamp(0.0, 5.0));

        let direction = match raw_input.get("direction").and_then(Value::as_str) {
            Some(d) => direction_of(d),
            None => direction_of(&text),
        };
        fv.set("direction", direction);

        fv.set("sentiment", self.sentiment.analyze(&text));

        let numerics: Vec<f64> = raw_input
            .iter()
            .filter(|(k, _)| k.as_str() != "outcome")
            .filter_map(|(_, v)| v.as_f64())
            .chain(text_numbers.iter().copied())
            .collect();
        let mean = if numerics.is_empty() {
            0.0
        } else {
            numerics.iter().sum::<f64>() / numerics.len() as f64
        };
        fv.set("stat_mean_norm", ratio(mean, typical).clamp(-5.0, 5.0));
        fv.set("numeric_count", (numerics.len() as f64 / 10.0).min(1.0));

        fv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::league::League;
    use serde_json::json;

    fn input(value: Value) -> InputData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(
            parse_numbers("LeBron scores over 25.5 points (last 3 games)"),
            vec![25.5, 3.0]
        );
        assert!(parse_numbers("no digits here").is_empty());
    }

    #[test]
    fn test_direction() {
        assert_eq!(direction_of("scores over 25 points"), 1.0);
        assert_eq!(direction_of("Under 210.5 total"), -1.0);
        assert_eq!(direction_of("plays tonight"), 0.0);
    }

    #[test]
    fn test_extract_from_text() {
        let extractor = HeuristicFeatureExtractor::new();
        let ctx = FeatureContext::for_league(League::Nba);
        let fv = extractor.extract(
            &input(json!({"factor": "LeBron scores over 25 points"})),
            &ctx,
        );
        assert_eq!(fv.get("direction"), Some(1.0));
        assert!(fv.get("score_norm").unwrap() > 0.0);
        assert_eq!(fv.get("win_pct"), Some(0.5));
    }

    #[test]
    fn test_structured_keys_take_precedence() {
        let extractor = HeuristicFeatureExtractor::new();
        let ctx = FeatureContext::for_league(League::Nfl);
        let fv = extractor.extract(
            &input(json!({
                "wins": 6, "losses": 2,
                "opponent_win_pct": 0.25,
                "recent_form": ["W", "W", "L", "W"],
                "injuries": ["QB", "WR"],
                "is_home": true,
                "rest_days": 7
            })),
            &ctx,
        );
        assert_eq!(fv.get("win_pct"), Some(0.75));
        assert_eq!(fv.get("opponent_win_pct"), Some(0.25));
        assert_eq!(fv.get("recent_form"), Some(0.75));
        assert_eq!(fv.get("injuries"), Some(0.4));
        assert_eq!(fv.get("is_home"), Some(1.0));
        assert_eq!(fv.get("rest_days"), Some(1.0));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = HeuristicFeatureExtractor::new();
        let ctx = FeatureContext::for_league(League::Mlb);
        let raw = input(json!({"factor": "Yankees win at home, hot streak"}));
        assert_eq!(extractor.extract(&raw, &ctx), extractor.extract(&raw, &ctx));
    }
}
