use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Capacity-bounded cache whose entries expire a fixed time after insertion,
/// regardless of how often they are read.
///
/// On insert, expired entries are purged first; if the cache is still full
/// the least recently used entry is evicted.
pub struct TtlCache<K: Hash + Eq + Clone, V: Clone> {
    inner: Mutex<LruCache<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, (V, Instant)>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("TtlCache: Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.lock();
        let expired = match cache.get(key) {
            Some((_, inserted_at)) => inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            cache.pop(key);
            return None;
        }
        cache.get(key).map(|(v, _)| v.clone())
    }

    pub fn set(&self, key: K, value: V) {
        let mut cache = self.lock();
        Self::purge_locked(&mut cache, self.ttl);
        cache.put(key, (value, Instant::now()));
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().pop(key).map(|(v, _)| v)
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut cache = self.lock();
        Self::purge_locked(&mut cache, self.ttl)
    }

    fn purge_locked(cache: &mut LruCache<K, (V, Instant)>, ttl: Duration) -> usize {
        let expired: Vec<K> = cache
            .iter()
            .filter(|(_, (_, inserted_at))| inserted_at.elapsed() > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            cache.pop(key);
        }
        expired.len()
    }

    /// Entries currently held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Keys of live entries
    pub fn keys(&self) -> Vec<K> {
        self.lock()
            .iter()
            .filter(|(_, (_, inserted_at))| inserted_at.elapsed() <= self.ttl)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
