use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Capacity-bounded cache with least-recently-used eviction and no expiry.
///
/// Safe for concurrent get/set; a poisoned lock is recovered rather than
/// propagated since cache contents are always reconstructible.
pub struct BoundedLruCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
    capacity: NonZeroUsize,
}

impl<K: Hash + Eq, V: Clone> std::fmt::Debug for BoundedLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedLruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl<K: Hash + Eq, V: Clone> BoundedLruCache<K, V> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("BoundedLruCache: Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Look up and mark as most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Insert or replace. Returns the evicted entry when capacity was exceeded.
    pub fn set(&self, key: K, value: V) -> Option<(K, V)> {
        let mut cache = self.lock();
        if cache.contains(&key) {
            cache.put(key, value);
            None
        } else {
            cache.push(key, value)
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().pop(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
