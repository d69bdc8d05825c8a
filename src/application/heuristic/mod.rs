pub mod predictor;

pub use predictor::{HeuristicOutcome, HeuristicPredictor};
