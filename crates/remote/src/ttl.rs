// Path: crates/remote/src/ttl.rs

//! Expiring maps for seen-sets and peer memory.
//!
//! Backed by a bounded LRU so memory stays capped even under sweep
//! starvation. Entries expire against monotonic time; expired entries are
//! evicted lazily on access and in bulk by [`TtlCache::sweep`].

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// A bounded map whose entries expire after a fixed TTL.
pub struct TtlCache<K: Hash + Eq, V> {
    ttl: Duration,
    entries: LruCache<K, (V, Instant)>,
}

impl<K: Hash + Eq + Clone, V> TtlCache<K, V> {
    /// Creates a cache with the given TTL and entry cap.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or_else(|| unreachable!());
        Self {
            ttl,
            entries: LruCache::new(capacity),
        }
    }

    /// Inserts or refreshes an entry.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.put(key, (value, Instant::now()));
    }

    /// Returns true if the key is present and unexpired, evicting it when
    /// expired.
    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Looks up an unexpired entry, evicting it when expired.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = match self.entries.peek(key) {
            Some((_, at)) => at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|(v, _)| v)
    }

    /// Removes an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.pop(key).map(|(v, _)| v)
    }

    /// Evicts every expired entry. Called from the periodic sweeper.
    pub fn sweep(&mut self) {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, (_, at))| at.elapsed() >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.entries.pop(&key);
        }
    }

    /// Number of entries, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache: TtlCache<u32, ()> = TtlCache::new(Duration::from_millis(20), 16);
        cache.insert(1, ());
        assert!(cache.contains(&1));

        std::thread::sleep(Duration::from_millis(30));
        assert!(!cache.contains(&1));
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_evicts_expired_in_bulk() {
        let mut cache: TtlCache<u32, ()> = TtlCache::new(Duration::from_millis(10), 16);
        cache.insert(1, ());
        cache.insert(2, ());
        std::thread::sleep(Duration::from_millis(20));
        cache.insert(3, ());

        cache.sweep();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&3));
    }

    #[test]
    fn capacity_bounds_the_map() {
        let mut cache: TtlCache<u32, ()> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(1, ());
        cache.insert(2, ());
        cache.insert(3, ());
        assert_eq!(cache.len(), 2);
    }
}
