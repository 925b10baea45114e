//! In-Process TTL Cache
//!
//! `TtlCache` adapter backed by a `HashMap` behind a read/write lock.
//! Entries expire passively on read; `purge_expired` reclaims memory for
//! keys that are never read again.
//!
//! Uses `tokio::time::Instant` so expiry follows the runtime clock (and a
//! paused clock in tests).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::application::ports::TtlCache;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory key/value store with per-entry expiry.
#[derive(Debug)]
pub struct InMemoryTtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for InMemoryTtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryTtlCache<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache stores no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl<K, V> TtlCache<K, V> for InMemoryTtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .insert(key, CacheEntry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn get_returns_value_within_ttl() {
        let cache = InMemoryTtlCache::new();
        cache.set("BTCUSD", 1, Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get(&"BTCUSD").await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn get_returns_none_after_ttl() {
        let cache = InMemoryTtlCache::new();
        cache.set("BTCUSD", 1, Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get(&"BTCUSD").await, None);
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_key() {
        let cache: InMemoryTtlCache<&str, i32> = InMemoryTtlCache::new();
        assert_eq!(cache.get(&"ETHUSD").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_value_and_ttl() {
        let cache = InMemoryTtlCache::new();
        cache.set("BTCUSD", 1, Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.set("BTCUSD", 2, Duration::from_secs(5)).await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get(&"BTCUSD").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache = InMemoryTtlCache::new();
        cache.set("BTCUSD", 1, Duration::from_secs(5)).await;
        cache.set("ETHUSD", 2, Duration::from_secs(50)).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"ETHUSD").await, Some(2));
    }
}
