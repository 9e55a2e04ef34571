//! TTL-and-LRU bounded cache for normalized image results.
//!
//! Expiry is read-through: an expired entry is treated as absent and dropped
//! on the read that finds it; there is no background sweep. The LRU bound
//! keeps the map from growing without limit.
//!
//! Not internally synchronized. Concurrent request handlers wrap the cache
//! in a mutex and tolerate last-writer-wins on the same key.

use crate::relay::normalize::NormalizedImageResult;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct CacheEntry {
    result: NormalizedImageResult,
    stored_at: Instant,
}

pub struct ImageCache {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
}

impl ImageCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Deterministic key over the generation inputs. Field order matters;
    /// an absent character id is the empty string, not a distinct marker.
    /// Fields are separated so boundaries cannot collide.
    pub fn key(character_id: &str, archetype: &str, prompt: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        for field in [character_id, archetype, prompt] {
            hasher.update(field.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn get(&mut self, key: &str) -> Option<NormalizedImageResult> {
        self.get_at(key, Instant::now())
    }

    /// Unconditionally overwrites any existing entry, stamping the current
    /// time.
    pub fn put(&mut self, key: String, result: NormalizedImageResult) {
        self.put_at(key, result, Instant::now());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<NormalizedImageResult> {
        let expired = match self.entries.get(key) {
            Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.pop(key);
        }
        None
    }

    fn put_at(&mut self, key: String, result: NormalizedImageResult, now: Instant) {
        self.entries.put(key, CacheEntry { result, stored_at: now });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> NormalizedImageResult {
        NormalizedImageResult {
            url: url.to_string(),
        }
    }

    #[test]
    fn test_put_get_round_trip() {
        let mut cache = ImageCache::new(16, Duration::from_secs(60));
        let key = ImageCache::key("char-1", "wizard", "a cat");

        cache.put(key.clone(), result("https://img/1"));
        assert_eq!(cache.get(&key), Some(result("https://img/1")));
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let ttl = Duration::from_secs(60);
        let mut cache = ImageCache::new(16, ttl);
        let now = Instant::now();

        cache.put_at("k".to_string(), result("https://img/1"), now);

        assert_eq!(cache.get_at("k", now + ttl - Duration::from_secs(1)).as_ref().map(|r| r.url.as_str()), Some("https://img/1"));
        assert_eq!(cache.get_at("k", now + ttl), None);
        // read-through expiry dropped the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_overwrites_and_restamps() {
        let ttl = Duration::from_secs(60);
        let mut cache = ImageCache::new(16, ttl);
        let now = Instant::now();

        cache.put_at("k".to_string(), result("https://img/old"), now);
        cache.put_at("k".to_string(), result("https://img/new"), now + Duration::from_secs(59));

        // the restamped entry outlives the original TTL window
        assert_eq!(cache.get_at("k", now + ttl), Some(result("https://img/new")));
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let mut cache = ImageCache::new(2, Duration::from_secs(60));

        cache.put("a".to_string(), result("https://img/a"));
        cache.put("b".to_string(), result("https://img/b"));
        cache.put("c".to_string(), result("https://img/c"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(
            ImageCache::key("id", "wizard", "a cat"),
            ImageCache::key("id", "wizard", "a cat")
        );
    }

    #[test]
    fn test_key_field_order_matters() {
        assert_ne!(
            ImageCache::key("wizard", "id", "a cat"),
            ImageCache::key("id", "wizard", "a cat")
        );
    }

    #[test]
    fn test_key_field_boundaries_do_not_collide() {
        assert_ne!(ImageCache::key("ab", "c", ""), ImageCache::key("a", "bc", ""));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = ImageCache::new(0, Duration::from_secs(60));
        cache.put("k".to_string(), result("https://img/1"));
        assert_eq!(cache.len(), 1);
    }
}
