pub mod forest_estimator;
pub mod online_estimator;

pub use forest_estimator::{ForestEstimator, ForestParams};
pub use online_estimator::OnlineLogisticEstimator;
