use crate::infrastructure::observability::Metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,   // Normal operation - requests pass through
    Open,     // Failure threshold breached - reject all requests
    HalfOpen, // Testing if service recovered - allow limited probes
}

impl CircuitState {
    /// Gauge encoding: 0 = closed, 1 = half-open, 2 = open
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before opening
    pub failure_threshold: u32,
    /// Time spent Open before a probe is let through
    pub reset_timeout: Duration,
    /// Probes admitted while HalfOpen
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, reset_timeout: Duration, half_open_max_calls: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            half_open_max_calls: half_open_max_calls.max(1),
        }
    }

    /// Retry-after hint reported to callers, in whole seconds (rounded up)
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_timeout.as_secs_f64().ceil() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Open,
    TooManyRecoveryAttempts,
}

/// Returned when the breaker fails fast without running the operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker [{name}] rejected call ({reason:?}). Retry in {retry_after_secs}s")]
pub struct CircuitOpenError {
    pub name: String,
    pub retry_after_secs: u64,
    pub reason: RejectReason,
}

/// Error type for circuit breaker
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("{0}")]
    Open(CircuitOpenError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_probe_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub total_failures: u64,
    pub total_successes: u64,
    pub total_timeouts: u64,
    pub total_rejections: u64,
    pub state_transitions: u64,
    pub failure_threshold: u32,
    pub reset_timeout_secs: f64,
    pub half_open_max_calls: u32,
}

struct CircuitBreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_probes: u32,
    last_failure_time: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    total_failures: u64,
    total_successes: u64,
    total_timeouts: u64,
    total_rejections: u64,
    state_transitions: u64,
}

/// Circuit breaker for protecting against cascading failures.
///
/// Admission (`try_acquire`) and outcome recording (`record_*`) each take the
/// state lock once, so the HalfOpen probe check-and-increment cannot race.
pub struct CircuitBreaker {
    state: RwLock<CircuitBreakerState>,
    config: CircuitBreakerConfig,
    name: String,
    metrics: Option<Metrics>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// # Arguments
    /// * `name` - Dependency identifier for logging and metrics
    /// * `config` - Thresholds and timeouts
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(CircuitBreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_probes: 0,
                last_failure_time: None,
                last_failure_at: None,
                total_failures: 0,
                total_successes: 0,
                total_timeouts: 0,
                total_rejections: 0,
                state_transitions: 0,
            }),
            config,
            name: name.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        metrics.set_circuit_state(&self.name, CircuitState::Closed.as_gauge());
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute a future with circuit breaker protection.
    ///
    /// The future is never polled when the breaker fails fast.
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.try_acquire().await.map_err(CircuitBreakerError::Open)?;

        match f.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(e) => {
                self.record_failure().await;
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    /// Like `call`, but a future that misses `deadline` is dropped and
    /// recorded as a timeout failure.
    pub async fn call_with_timeout<F, T, E>(
        &self,
        deadline: Duration,
        f: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.try_acquire().await.map_err(CircuitBreakerError::Open)?;

        match tokio::time::timeout(deadline, f).await {
            Ok(Ok(result)) => {
                self.record_success().await;
                Ok(result)
            }
            Ok(Err(e)) => {
                self.record_failure().await;
                Err(CircuitBreakerError::Inner(e))
            }
            Err(_) => {
                self.record_timeout().await;
                Err(CircuitBreakerError::Timeout(deadline))
            }
        }
    }

    /// Admission check. On `Ok` the caller must report exactly one outcome:
    /// `record_success`, `record_failure`, `record_timeout` or `release`.
    pub async fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = state.last_failure_time.map(|t| t.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed < self.config.reset_timeout => {
                        state.total_rejections += 1;
                        debug!(
                            "CircuitBreaker [{}]: Open, fast-failing ({:?} until probe)",
                            self.name,
                            self.config.reset_timeout - elapsed
                        );
                        Err(self.rejection(RejectReason::Open))
                    }
                    _ => {
                        info!(
                            "CircuitBreaker [{}]: Transitioning Open -> HalfOpen (timeout elapsed)",
                            self.name
                        );
                        self.transition(&mut state, CircuitState::HalfOpen);
                        state.half_open_probes = 1;
                        Ok(())
                    }
                }
            }
            CircuitState::HalfOpen => {
                if state.half_open_probes >= self.config.half_open_max_calls {
                    state.total_rejections += 1;
                    warn!(
                        "CircuitBreaker [{}]: HalfOpen, too many recovery attempts ({}/{})",
                        self.name, state.half_open_probes, self.config.half_open_max_calls
                    );
                    return Err(self.rejection(RejectReason::TooManyRecoveryAttempts));
                }
                state.half_open_probes += 1;
                Ok(())
            }
        }
    }

    /// Record a successful call
    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        state.total_successes += 1;

        match state.state {
            CircuitState::HalfOpen => {
                info!(
                    "CircuitBreaker [{}]: Transitioning HalfOpen -> Closed (probe succeeded)",
                    self.name
                );
                self.transition(&mut state, CircuitState::Closed);
                state.consecutive_failures = 0;
            }
            CircuitState::Closed => {
                // Reset failure count on success
                state.consecutive_failures = 0;
            }
            CircuitState::Open => {
                // A call admitted before the trip finished late
                debug!(
                    "CircuitBreaker [{}]: Success recorded while Open (straggler)",
                    self.name
                );
            }
        }
    }

    /// Record a failed call
    pub async fn record_failure(&self) {
        self.on_failure(false).await;
    }

    /// Record a call that did not complete within its deadline
    pub async fn record_timeout(&self) {
        self.on_failure(true).await;
    }

    /// Give back an admission whose outcome says nothing about the dependency
    pub async fn release(&self) {
        let mut state = self.state.write().await;
        if state.state == CircuitState::HalfOpen && state.half_open_probes > 0 {
            state.half_open_probes -= 1;
        }
    }

    async fn on_failure(&self, timed_out: bool) {
        let mut state = self.state.write().await;

        state.total_failures += 1;
        if timed_out {
            state.total_timeouts += 1;
        }

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    error!(
                        "CircuitBreaker [{}]: Transitioning Closed -> Open ({} failures)",
                        self.name, state.consecutive_failures
                    );
                    Self::stamp_failure(&mut state);
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in HalfOpen immediately reopens circuit
                warn!(
                    "CircuitBreaker [{}]: Transitioning HalfOpen -> Open (failure during recovery)",
                    self.name
                );
                state.consecutive_failures += 1;
                Self::stamp_failure(&mut state);
                self.transition(&mut state, CircuitState::Open);
            }
            CircuitState::Open => {
                // Already open, just count it
            }
        }
    }

    fn stamp_failure(state: &mut CircuitBreakerState) {
        state.last_failure_time = Some(Instant::now());
        state.last_failure_at = Some(Utc::now());
    }

    fn transition(&self, state: &mut CircuitBreakerState, to: CircuitState) {
        if state.state == CircuitState::HalfOpen && to != CircuitState::HalfOpen {
            state.half_open_probes = 0;
        }
        if to == CircuitState::HalfOpen {
            state.half_open_probes = 0;
        }
        state.state = to;
        state.state_transitions += 1;

        if let Some(metrics) = &self.metrics {
            metrics.set_circuit_state(&self.name, to.as_gauge());
        }
    }

    fn rejection(&self, reason: RejectReason) -> CircuitOpenError {
        CircuitOpenError {
            name: self.name.clone(),
            retry_after_secs: self.config.retry_after_secs(),
            reason,
        }
    }

    /// Get current circuit state
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    pub async fn status(&self) -> CircuitBreakerStatus {
        let state = self.state.read().await;
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            half_open_probe_count: state.half_open_probes,
            last_failure_at: state.last_failure_at,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
            total_timeouts: state.total_timeouts,
            total_rejections: state.total_rejections,
            state_transitions: state.state_transitions,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_secs: self.config.reset_timeout.as_secs_f64(),
            half_open_max_calls: self.config.half_open_max_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(threshold: u32, reset_ms: u64, probes: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::new(threshold, Duration::from_millis(reset_ms), probes),
        )
    }

    async fn fail(cb: &CircuitBreaker) {
        let _ = cb.call(async { Err::<(), &str>("error") }).await;
    }

    #[tokio::test]
    async fn test_opens_after_exactly_threshold_failures() {
        for threshold in 1..=5 {
            let cb = breaker(threshold, 10_000, 1);
            for _ in 0..threshold - 1 {
                fail(&cb).await;
            }
            assert_eq!(cb.state().await, CircuitState::Closed);

            fail(&cb).await;
            assert_eq!(cb.state().await, CircuitState::Open);
        }
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(3, 10_000, 1);
        fail(&cb).await;
        fail(&cb).await;
        let _ = cb.call(async { Ok::<(), &str>(()) }).await;
        fail(&cb).await;
        fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert_eq!(cb.status().await.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_open_fast_fails_without_invoking() {
        let cb = breaker(2, 10_000, 1);
        fail(&cb).await;
        fail(&cb).await;

        let invocations = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = invocations.clone();
            let result = cb
                .call(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), &str>(())
                })
                .await;
            match result {
                Err(CircuitBreakerError::Open(e)) => {
                    assert_eq!(e.reason, RejectReason::Open);
                    assert_eq!(e.retry_after_secs, 10);
                    assert_eq!(e.name, "test");
                }
                _ => panic!("expected fast-fail"),
            }
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        assert_eq!(cb.status().await.total_rejections, 5);
    }

    #[tokio::test]
    async fn test_circuit_recovers_after_timeout() {
        let cb = breaker(2, 100, 1);
        fail(&cb).await;
        fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Probe is admitted and closes the circuit
        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        assert!(result.is_ok());
        let status = cb.status().await;
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.half_open_probe_count, 0);
        assert_eq!(status.consecutive_failures, 0);
        // Closed -> Open -> HalfOpen -> Closed
        assert_eq!(status.state_transitions, 3);
    }

    #[tokio::test]
    async fn test_halfopen_reopens_on_failure() {
        let cb = breaker(2, 100, 1);
        fail(&cb).await;
        fail(&cb).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        // Fresh timeout window after the failed probe
        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }

    #[tokio::test]
    async fn test_halfopen_admits_bounded_probes() {
        let cb = Arc::new(breaker(1, 50, 3));
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Admit without reporting outcomes to hold the probe slots
        let mut admitted = 0;
        let mut rejected = 0;
        for _ in 0..6 {
            match cb.try_acquire().await {
                Ok(()) => admitted += 1,
                Err(e) => {
                    assert_eq!(e.reason, RejectReason::TooManyRecoveryAttempts);
                    rejected += 1;
                }
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(rejected, 3);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_concurrent_probes_are_bounded() {
        let cb = Arc::new(breaker(1, 50, 2));
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move { cb.try_acquire().await.is_ok() }));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 2);
    }

    #[tokio::test]
    async fn test_release_returns_probe_slot() {
        let cb = breaker(1, 50, 1);
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cb.try_acquire().await.is_ok());
        assert!(cb.try_acquire().await.is_err());
        cb.release().await;
        assert!(cb.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_timeouts_are_counted_and_trip() {
        let cb = breaker(2, 10_000, 1);
        for _ in 0..2 {
            let result = cb
                .call_with_timeout(Duration::from_millis(10), async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<(), &str>(())
                })
                .await;
            assert!(matches!(result, Err(CircuitBreakerError::Timeout(_))));
        }
        let status = cb.status().await;
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.total_timeouts, 2);
        assert_eq!(status.total_failures, 2);
        assert!(status.last_failure_at.is_some());
    }

    #[tokio::test]
    async fn test_inner_error_is_propagated() {
        let cb = breaker(5, 10_000, 1);
        let result = cb.call(async { Err::<(), &str>("boom") }).await;
        match result {
            Err(CircuitBreakerError::Inner(e)) => assert_eq!(e, "boom"),
            _ => panic!("expected inner error"),
        }
        assert_eq!(cb.status().await.total_failures, 1);
    }
}
