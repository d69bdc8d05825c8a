use crate::infrastructure::core::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus,
};
use crate::infrastructure::observability::Metrics;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Named circuit breakers, created lazily on first reference.
///
/// Entries are never removed; a breaker lives as long as the registry.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    metrics: Option<Metrics>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Metrics) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            metrics: Some(metrics),
        }
    }

    /// Return the breaker registered under `name`, creating it with `config`
    /// if absent. An existing breaker keeps its original config.
    pub async fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().await.get(name) {
            return existing.clone();
        }

        let mut breakers = self.breakers.write().await;
        // Another caller may have created it between the two locks
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(
                    "CircuitBreakerRegistry: Creating breaker [{}] (threshold={}, reset={:?}, probes={})",
                    name, config.failure_threshold, config.reset_timeout, config.half_open_max_calls
                );
                let breaker = CircuitBreaker::new(name, config);
                let breaker = match &self.metrics {
                    Some(metrics) => breaker.with_metrics(metrics.clone()),
                    None => breaker,
                };
                Arc::new(breaker)
            })
            .clone()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().await.get(name).cloned()
    }

    pub async fn get_all_statuses(&self) -> BTreeMap<String, CircuitBreakerStatus> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().cloned().collect();

        let mut statuses = BTreeMap::new();
        for breaker in breakers {
            statuses.insert(breaker.name().to_string(), breaker.status().await);
        }
        statuses
    }

    pub async fn len(&self) -> usize {
        self.breakers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.breakers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::core::circuit_breaker::CircuitState;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry
            .get_or_create("database", CircuitBreakerConfig::default())
            .await;
        let b = registry
            .get_or_create(
                "database",
                CircuitBreakerConfig::new(1, Duration::from_secs(1), 1),
            )
            .await;
        assert!(Arc::ptr_eq(&a, &b));
        // Second config ignored
        assert_eq!(b.config().failure_threshold, 5);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_statuses_cover_all_breakers() {
        let registry = CircuitBreakerRegistry::new();
        let db = registry
            .get_or_create("database", CircuitBreakerConfig::new(1, Duration::from_secs(30), 1))
            .await;
        registry
            .get_or_create("cache", CircuitBreakerConfig::default())
            .await;

        db.record_failure().await;

        let statuses = registry.get_all_statuses().await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses["database"].state, CircuitState::Open);
        assert_eq!(statuses["cache"].state, CircuitState::Closed);
        assert!(registry.get("missing").await.is_none());
    }
}
