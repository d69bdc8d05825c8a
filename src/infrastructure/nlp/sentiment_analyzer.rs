//! Local sentiment scoring for factor text using VADER
//!
//! VADER's compound score is combined with a small sports lexicon so that
//! phrases like "ruled out" or "on a hot streak" move the score the way a
//! bettor would read them.

use vader_sentiment::SentimentIntensityAnalyzer;

const POSITIVE_KEYWORDS: &[(&str, f64)] = &[
    ("win", 0.2),
    ("wins", 0.2),
    ("winning streak", 0.4),
    ("hot streak", 0.4),
    ("dominant", 0.4),
    ("dominates", 0.4),
    ("blowout", 0.3),
    ("career high", 0.4),
    ("season high", 0.3),
    ("returns", 0.2),
    ("healthy", 0.3),
    ("cleared", 0.3),
    ("undefeated", 0.5),
    ("clinch", 0.3),
    ("rested", 0.2),
];

const NEGATIVE_KEYWORDS: &[(&str, f64)] = &[
    ("injury", -0.4),
    ("injured", -0.4),
    ("ruled out", -0.5),
    ("questionable", -0.3),
    ("doubtful", -0.4),
    ("suspended", -0.5),
    ("slump", -0.4),
    ("losing streak", -0.4),
    ("cold streak", -0.4),
    ("benched", -0.3),
    ("back-to-back", -0.2),
    ("fatigue", -0.3),
    ("eliminated", -0.4),
    ("struggles", -0.3),
];

/// VADER analyzer with sports keyword boosting
pub struct SentimentAnalyzer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    fn keyword_boost(&self, text: &str) -> f64 {
        let text_lower = text.to_lowercase();
        POSITIVE_KEYWORDS
            .iter()
            .chain(NEGATIVE_KEYWORDS)
            .filter(|(keyword, _)| text_lower.contains(keyword))
            .map(|(_, score)| score)
            .sum()
    }

    /// Sentiment score in `[-1.0, 1.0]`; empty text is neutral.
    pub fn analyze(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }

        let scores = self.analyzer.polarity_scores(text);
        let vader_score = scores["compound"];
        (vader_score + self.keyword_boost(text) * 0.5).clamp(-1.0, 1.0)
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
