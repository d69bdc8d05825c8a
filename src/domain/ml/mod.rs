pub mod estimator;
pub mod feature_registry;
pub mod performance;

pub use estimator::{Estimator, StreamingEstimator};
pub use feature_registry::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
pub use performance::{PerformanceHistory, PerformanceMetrics};
