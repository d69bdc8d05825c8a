use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure categories reported to callers and used as metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ServiceUnavailable,
    RateLimitExceeded,
    NoValidPredictions,
    DependencyFailure,
    UnexpectedError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::NoValidPredictions => "no_valid_predictions",
            ErrorKind::DependencyFailure => "dependency_failure",
            ErrorKind::UnexpectedError => "unexpected_error",
        }
    }
}

/// Errors a prediction request can end in
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictionError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Service unavailable: {dependency} is failing, retry after {retry_after_secs}s")]
    ServiceUnavailable {
        dependency: String,
        retry_after_secs: u64,
    },

    #[error("Rate limit exceeded for {league}: retry after {retry_after_ms}ms")]
    RateLimitExceeded { league: String, retry_after_ms: u64 },

    #[error("No valid predictions: all {attempted} sub-predictions failed")]
    NoValidPredictions { attempted: usize },

    #[error("Dependency {dependency} failed: {message}")]
    DependencyFailure { dependency: String, message: String },

    /// A dependency failure caused by a missed deadline
    #[error("Dependency {dependency} timed out: {task} exceeded {deadline_ms}ms")]
    Timeout {
        dependency: String,
        task: String,
        deadline_ms: u64,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PredictionError {
    pub fn dependency(dependency: impl Into<String>, message: impl ToString) -> Self {
        PredictionError::DependencyFailure {
            dependency: dependency.into(),
            message: message.to_string(),
        }
    }

    pub fn timeout(dependency: impl Into<String>, task: impl Into<String>, deadline: Duration) -> Self {
        PredictionError::Timeout {
            dependency: dependency.into(),
            task: task.into(),
            deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PredictionError::Timeout { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::Validation(_) => ErrorKind::ValidationError,
            PredictionError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            PredictionError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            PredictionError::NoValidPredictions { .. } => ErrorKind::NoValidPredictions,
            PredictionError::DependencyFailure { .. } | PredictionError::Timeout { .. } => {
                ErrorKind::DependencyFailure
            }
            PredictionError::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }

    /// Whether this outcome says something about the health of the
    /// inference path. Caller mistakes and throttling do not.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            PredictionError::NoValidPredictions { .. }
                | PredictionError::DependencyFailure { .. }
                | PredictionError::Timeout { .. }
                | PredictionError::Unexpected(_)
        )
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            PredictionError::ServiceUnavailable {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            PredictionError::RateLimitExceeded { retry_after_ms, .. } => {
                Some(retry_after_ms.div_ceil(1000))
            }
            _ => None,
        }
    }
}

/// Structured error payload returned at the request boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResult {
    pub error: bool,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    pub input: Value,
}

impl ErrorResult {
    pub fn from_error(err: &PredictionError, input: Value) -> Self {
        Self {
            error: true,
            kind: err.kind(),
            message: err.to_string(),
            retry_after_seconds: err.retry_after_secs(),
            input,
        }
    }
}

/// Errors raised by an Estimator implementation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EstimatorError {
    #[error("Model is not fitted")]
    NotFitted,

    #[error("Invalid training data: {0}")]
    InvalidData(String),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Estimator backend failed: {0}")]
    Backend(String),
}
