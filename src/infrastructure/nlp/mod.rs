pub mod feature_extractor;
pub mod sentiment_analyzer;

pub use feature_extractor::HeuristicFeatureExtractor;
pub use sentiment_analyzer::SentimentAnalyzer;
