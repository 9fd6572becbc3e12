use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::hash::Hash;

/// Key/value memo store used for page bodies and calendar lookups.
///
/// Implementations must make `get_or_insert_with` atomic per key so that
/// concurrent queries for the same key build the value once.
pub trait KeyedCache<K, V> {
    fn get(&self, key: &K) -> Option<V>;
    fn insert(&self, key: K, value: V);
    fn get_or_insert_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V;
}

pub struct MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Bounded cache evicting the least recently used entry first.
    pub fn bounded_lru(capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// Cache without eviction, for small fixed key spaces.
    pub fn unbounded() -> Self {
        Self {
            inner: Cache::builder().build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl<K, V> KeyedCache<K, V> for MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    fn get_or_insert_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.inner.get_with(key, init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_or_insert_runs_init_once() {
        let cache: MemoryCache<(String, i32), u32> = MemoryCache::unbounded();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let value = cache.get_or_insert_with(("JP".to_string(), 2025), || {
                calls.set(calls.get() + 1);
                7
            });
            assert_eq!(value, 7);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.get(&("JP".to_string(), 2025)), Some(7));
        assert_eq!(cache.get(&("JP".to_string(), 2026)), None);
    }

    #[test]
    fn bounded_cache_stays_within_capacity() {
        let cache: MemoryCache<u32, String> = MemoryCache::bounded_lru(2);
        for key in 0..10 {
            cache.insert(key, format!("page-{key}"));
        }
        assert!(cache.entry_count() <= 2);
    }
}
