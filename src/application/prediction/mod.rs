pub mod context;
pub mod fingerprint;
pub mod insights;
pub mod orchestrator;
pub mod rate_limiter;
pub mod streaming;

pub use context::PredictionContext;
pub use orchestrator::{PredictionOrchestrator, PredictionResponse};
pub use rate_limiter::{RateLimitClaim, RateLimiter};
pub use streaming::{StreamBuffer, StreamItem};
