//! In-memory TTL cache with lazy expiry.
//!
//! Entries are checked at read time; an expired entry reads as absent and is
//! removed by that read. There is no background sweeper. Safe to share across
//! concurrent audit fetches.

use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached value and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key/value store with per-entry expiry.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Value for `key`, unless absent or expired. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Re-check under the write lock: a concurrent `set` may have refreshed it.
        self.entries.remove_if(key, |_, e| e.is_expired(now));
        debug!(key, "cache entry expired");
        None
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.into(), entry);
    }

    /// Remove `key`. Returns whether an entry (expired or not) was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Physically stored entries, including expired ones not yet read.
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

/// Build a cache key from request identity.
///
/// `scope` separates otherwise identical requests made on behalf of different
/// accounts. It is hashed, and callers pass an identity (such as a username),
/// never a secret.
pub fn cache_key(method: &str, canonical_url: &str, scope: &str) -> String {
    let mut key = format!("{}:{}", method.to_ascii_uppercase(), canonical_url);
    if !scope.is_empty() {
        let mut hasher = DefaultHasher::new();
        scope.hash(&mut hasher);
        key.push_str(&format!("#{:016x}", hasher.finish()));
    }
    key
}
