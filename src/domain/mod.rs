// Domain configuration value objects
pub mod config;

// Domain-specific error types
pub mod errors;

// Supported leagues
pub mod league;

// Model capability traits and evaluation
pub mod ml;

// Port interfaces
pub mod ports;

// Requests, results, insights
pub mod prediction;
