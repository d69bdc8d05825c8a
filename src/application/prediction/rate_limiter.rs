//! Per-league cooldown between served predictions.
//!
//! The last-served time lives in the key/value store under
//! `rate_limit:{league}`. A missing marker reads as epoch zero, so the first
//! request is always allowed. When the store is unavailable the limiter
//! fails open.
//!
//! `acquire` checks and claims the marker under a per-league lock, so two
//! concurrent requests cannot both pass the same cooldown. The claim is kept
//! with `commit` when the prediction is served and rolled back with
//! `release` when it fails.

use crate::application::system::guard::call_dependency;
use crate::domain::errors::PredictionError;
use crate::domain::league::League;
use crate::domain::ports::KeyValueStore;
use crate::infrastructure::core::circuit_breaker::CircuitBreakerConfig;
use crate::infrastructure::core::circuit_breaker_registry::CircuitBreakerRegistry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Breaker guarding the key/value store
pub const CACHE_BREAKER: &str = "cache";

/// A passed cooldown check holding the league's marker
#[derive(Debug)]
pub struct RateLimitClaim {
    league: League,
    claimed_ms: Option<i64>,
    previous: Option<String>,
}

impl RateLimitClaim {
    pub fn league(&self) -> League {
        self.league
    }
}

pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    breakers: Arc<CircuitBreakerRegistry>,
    breaker_config: CircuitBreakerConfig,
    cooldown: Duration,
    marker_ttl: Duration,
    league_locks: HashMap<League, Arc<Mutex<()>>>,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        breakers: Arc<CircuitBreakerRegistry>,
        breaker_config: CircuitBreakerConfig,
        cooldown: Duration,
        marker_ttl: Duration,
    ) -> Self {
        Self {
            store,
            breakers,
            breaker_config,
            cooldown,
            marker_ttl,
            league_locks: League::ALL
                .iter()
                .map(|l| (*l, Arc::new(Mutex::new(()))))
                .collect(),
        }
    }

    pub fn key(league: League) -> String {
        format!("rate_limit:{}", league.slug())
    }

    fn lock_for(&self, league: League) -> Arc<Mutex<()>> {
        // The map is built from League::ALL so every key is present.
        self.league_locks[&league].clone()
    }

    pub async fn acquire(&self, league: League) -> Result<RateLimitClaim, PredictionError> {
        self.acquire_at(league, Utc::now().timestamp_millis()).await
    }

    /// Reject with `RateLimitExceeded` when less than the cooldown has
    /// passed since the last served prediction, as seen at `now_ms`.
    /// Otherwise claim the marker at `now_ms`.
    pub async fn acquire_at(&self, league: League, now_ms: i64) -> Result<RateLimitClaim, PredictionError> {
        let lock = self.lock_for(league);
        let _guard = lock.lock().await;

        let previous = match self.read_marker(league).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("RateLimiter: {} check skipped, store unavailable: {}", league, e);
                return Ok(RateLimitClaim {
                    league,
                    claimed_ms: None,
                    previous: None,
                });
            }
        };

        let last_ms = previous
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);
        let elapsed_ms = now_ms.saturating_sub(last_ms).max(0) as u64;
        let cooldown_ms = self.cooldown.as_millis() as u64;

        if elapsed_ms < cooldown_ms {
            debug!(
                "RateLimiter: {} throttled ({}ms since last, cooldown {}ms)",
                league, elapsed_ms, cooldown_ms
            );
            return Err(PredictionError::RateLimitExceeded {
                league: league.code().to_string(),
                retry_after_ms: cooldown_ms - elapsed_ms,
            });
        }

        let claimed_ms = self.write_marker(league, now_ms).await.then_some(now_ms);
        Ok(RateLimitClaim {
            league,
            claimed_ms,
            previous,
        })
    }

    /// Keep the claim, restarting the cooldown at the time of serving
    pub async fn commit(&self, claim: RateLimitClaim) {
        self.mark(claim.league).await;
    }

    /// Give the claim back. The previous marker is restored unless another
    /// request has claimed the league since.
    pub async fn release(&self, claim: RateLimitClaim) {
        let Some(claimed_ms) = claim.claimed_ms else {
            return;
        };
        let lock = self.lock_for(claim.league);
        let _guard = lock.lock().await;

        let current = match self.read_marker(claim.league).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("RateLimiter: failed to release {}: {}", claim.league, e);
                return;
            }
        };
        if current.as_deref() != Some(claimed_ms.to_string().as_str()) {
            return;
        }

        let key = Self::key(claim.league);
        let breaker = self
            .breakers
            .get_or_create(CACHE_BREAKER, self.breaker_config)
            .await;
        let restored = match &claim.previous {
            Some(previous) => {
                call_dependency(&breaker, self.store.set(&key, previous, Some(self.marker_ttl))).await
            }
            None => call_dependency(&breaker, self.store.delete(&key)).await,
        };
        if let Err(e) = restored {
            warn!("RateLimiter: failed to release {}: {}", claim.league, e);
        }
    }

    /// Record a served prediction now
    pub async fn mark(&self, league: League) {
        self.mark_at(league, Utc::now().timestamp_millis()).await;
    }

    pub async fn mark_at(&self, league: League, now_ms: i64) {
        let lock = self.lock_for(league);
        let _guard = lock.lock().await;
        self.write_marker(league, now_ms).await;
    }

    async fn read_marker(&self, league: League) -> Result<Option<String>, PredictionError> {
        let key = Self::key(league);
        let breaker = self
            .breakers
            .get_or_create(CACHE_BREAKER, self.breaker_config)
            .await;
        call_dependency(&breaker, self.store.get(&key)).await
    }

    async fn write_marker(&self, league: League, now_ms: i64) -> bool {
        let key = Self::key(league);
        let value = now_ms.to_string();
        let breaker = self
            .breakers
            .get_or_create(CACHE_BREAKER, self.breaker_config)
            .await;
        match call_dependency(
            &breaker,
            self.store.set(&key, &value, Some(self.marker_ttl)),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("RateLimiter: failed to mark {}: {}", league, e);
                false
            }
        }
    }
}
