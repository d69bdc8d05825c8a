pub mod circuit_breaker;
pub mod circuit_breaker_registry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStatus,
    CircuitOpenError, CircuitState, RejectReason,
};
pub use circuit_breaker_registry::CircuitBreakerRegistry;
