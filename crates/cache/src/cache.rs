//! The bounded, TTL-checked-on-read Response Cache. Reads happen before
//! the Coalescer; on a hit, the adapter, pacer, and coalescer are never
//! invoked (spec.md §4.5, invariant 3 in §8).

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::entry::CacheEntry;

struct TimedEntry {
    entry: CacheEntry,
    expires_at: Instant,
}

pub struct ResponseCache {
    inner: Mutex<LruCache<String, TimedEntry>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    /// Returns `None` both for a genuine miss and for an expired entry —
    /// callers cannot distinguish the two, matching the read contract in
    /// spec.md §4.5.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut guard = self.inner.lock().unwrap();
        let hit = guard.get(key)?;
        if hit.expires_at <= Instant::now() {
            guard.pop(key);
            return None;
        }
        Some(hit.entry.clone())
    }

    /// Writes only happen for a fully successful, non-cancelled,
    /// non-refused, safety-clean turn — enforced by the caller, not this
    /// crate.
    pub fn insert(&self, key: String, entry: CacheEntry, ttl: Duration) {
        self.inner.lock().unwrap().put(key, TimedEntry { entry, expires_at: Instant::now() + ttl });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_miss_after_ttl_elapses() {
        let cache = ResponseCache::new(10);
        let entry = CacheEntry::new("hi!", "social_chat", "ollama", "llama3.1:8b");
        cache.insert("key1".to_string(), entry, Duration::from_millis(20));
        assert!(cache.get("key1").is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("key1").is_none());
    }

    #[test]
    fn respects_capacity_with_lru_eviction() {
        let cache = ResponseCache::new(1);
        cache.insert(
            "a".to_string(),
            CacheEntry::new("a", "social_chat", "ollama", "m"),
            Duration::from_secs(60),
        );
        cache.insert(
            "b".to_string(),
            CacheEntry::new("b", "social_chat", "ollama", "m"),
            Duration::from_secs(60),
        );
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }
}
