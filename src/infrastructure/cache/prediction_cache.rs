use crate::domain::prediction::PredictionResult;
use crate::infrastructure::cache::lru_cache::BoundedLruCache;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// A cached result with its cache metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPrediction {
    pub result: PredictionResult,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedPrediction {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Hot prediction results keyed by request fingerprint.
///
/// Capacity is enforced by the LRU tier; envelopes past `expires_at` are
/// treated as misses and dropped on read.
pub struct PredictionCache {
    entries: BoundedLruCache<String, CachedPrediction>,
    ttl: Duration,
}

impl PredictionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: BoundedLruCache::new(capacity),
            ttl,
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<CachedPrediction> {
        let key = fingerprint.to_string();
        let cached = self.entries.get(&key)?;
        if cached.is_expired_at(Utc::now()) {
            self.entries.remove(&key);
            return None;
        }
        Some(cached)
    }

    pub fn set(&self, fingerprint: &str, result: PredictionResult) -> CachedPrediction {
        let cached_at = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or(ChronoDuration::minutes(5));
        let entry = CachedPrediction {
            result,
            cached_at,
            expires_at: cached_at + ttl,
        };
        self.entries.set(fingerprint.to_string(), entry.clone());
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
