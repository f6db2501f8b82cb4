use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

/// Injected key/value cache collaborator
pub trait Cache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&self, key: K, value: V);
    fn clear(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hit/miss counters for a cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entries<K, V> {
    values: HashMap<K, V>,
    /// Least recently used first
    order: VecDeque<K>,
    stats: CacheStats,
}

/// In-memory cache holding at most `capacity` entries, evicting least recently used
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: Mutex<Entries<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(Entries {
                values: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).stats
    }

    fn touch(order: &mut VecDeque<K>, key: &K) {
        if let Some(index) = order.iter().position(|k| k == key) {
            if let Some(k) = order.remove(index) {
                order.push_back(k);
            }
        }
    }
}

impl<K, V> Cache<K, V> for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.values.get(key).cloned() {
            Some(value) => {
                entries.stats.hits += 1;
                Self::touch(&mut entries.order, key);
                Some(value)
            }
            None => {
                entries.stats.misses += 1;
                None
            }
        }
    }

    fn set(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.values.insert(key.clone(), value).is_some() {
            Self::touch(&mut entries.order, &key);
            return;
        }

        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.values.remove(&oldest);
                entries.stats.evictions += 1;
            }
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values.clear();
        entries.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set() {
        let cache = BoundedCache::new(4);
        assert!(cache.is_empty());

        cache.set("gombe", 1);
        assert_eq!(cache.get(&"gombe"), Some(1));
        assert_eq!(cache.get(&"limete"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let cache = BoundedCache::new(3);
        for i in 0..10 {
            cache.set(i, i * 10);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.stats().evictions, 7);
        assert_eq!(cache.get(&9), Some(90));
        assert_eq!(cache.get(&0), None);
    }

    #[test]
    fn test_recently_used_entry_survives_eviction() {
        let cache = BoundedCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);

        // "a" becomes most recently used, so "b" goes first
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let cache = BoundedCache::new(2);
        cache.set("a", 1);
        cache.set("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache = BoundedCache::new(2);
        cache.set(1, "x");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&1), None);
    }
}
