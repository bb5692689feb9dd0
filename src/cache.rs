//! TTL-keyed cache for catalog search results.
//!
//! Keys are the deterministic composition of normalized query parameters
//! (see `SearchQuery::cache_key`); entries expire lazily on read.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

/// In-memory TTL cache. Process-local, reset on restart.
pub struct ResultCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value if the entry is still within its TTL; stale entries
    /// are removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                log::debug!("Cache entry expired: {}", key);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value, overwriting any previous entry for the key.
    pub fn set(&self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
        };
        self.entries.lock().unwrap().insert(key.to_string(), entry);
    }

    /// Drop the entry for a key, if present.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    /// Number of stored entries, including not-yet-collected stale ones.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_fresh_entry() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("k", 42u32);
        assert_eq!(cache.get("k"), Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_misses_unknown_key() {
        let cache: ResultCache<u32> = ResultCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("missing"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_entry_expires() {
        let cache = ResultCache::new(Duration::from_millis(20));
        cache.set("k", 1u32);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), None);
        // lazy expiry removed the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("k", 1u32);
        cache.set("k", 2u32);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("k", 1u32);
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }
}
