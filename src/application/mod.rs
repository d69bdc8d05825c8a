// Request pipeline and prediction strategies
pub mod prediction;

// Model training and the per-league registry
pub mod training;

// Concurrency and dependency guards
pub mod system;

// Background memory housekeeping
pub mod monitoring;

// Stand-alone text heuristics
pub mod heuristic;
