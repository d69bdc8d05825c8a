use crate::domain::errors::{EstimatorError, PredictionError};
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use std::future::Future;
use std::time::Duration;

/// Run a dependency call through its breaker, mapping the outcome onto the
/// request error taxonomy.
pub async fn call_dependency<T, F>(breaker: &CircuitBreaker, fut: F) -> Result<T, PredictionError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    breaker.call(fut).await.map_err(|e| match e {
        CircuitBreakerError::Open(open) => PredictionError::ServiceUnavailable {
            dependency: open.name,
            retry_after_secs: open.retry_after_secs,
        },
        CircuitBreakerError::Timeout(deadline) => PredictionError::timeout(breaker.name(), "call", deadline),
        CircuitBreakerError::Inner(e) => PredictionError::dependency(breaker.name(), format!("{:#}", e)),
    })
}

/// Run CPU-bound estimator work on the blocking pool with a deadline.
///
/// On expiry the caller gets `PredictionError::Timeout`; the blocking task
/// itself runs to completion in the background and its result is dropped.
pub async fn run_blocking<T, F>(deadline: Duration, task: &str, f: F) -> Result<T, PredictionError>
where
    F: FnOnce() -> Result<T, EstimatorError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(PredictionError::dependency("estimator", format!("{}: {}", task, e))),
        Ok(Err(join_error)) => Err(PredictionError::Unexpected(format!(
            "{} task failed: {}",
            task, join_error
        ))),
        Err(_) => Err(PredictionError::timeout("estimator", task, deadline)),
    }
}
