//! In-process cache store.
//!
//! Mirrors the Redis semantics the rest of the crate relies on: per-key
//! expiry and glob-pattern deletion. Used for tests and for single-process
//! deployments that inject it explicitly.

use super::store::{CacheError, CacheResult, CacheStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory cache store with lazy expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        self.purge_expired();

        let mut deleted = 0;
        self.entries.retain(|key, _| {
            if matcher.matches(key) {
                deleted += 1;
                false
            } else {
                true
            }
        });

        debug!(pattern = pattern, deleted = deleted, "Memory store delete pattern");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store
            .set_ex("cache:orders:1", "{\"id\":1}".into(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.get("cache:orders:1").await.unwrap().as_deref(),
            Some("{\"id\":1}")
        );
        assert_eq!(store.get("cache:orders:2").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v".into(), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_pattern_matches_glob() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        for key in [
            "cache:/api/v1/orders:{}",
            "cache:/api/v1/orders/42:{}",
            "cache:/api/v1/masters:{}",
        ] {
            store.set_ex(key, "[]".into(), ttl).await.unwrap();
        }

        let deleted = store.delete_pattern("cache:/api/v1/orders*").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len(), 1);
        assert!(store.get("cache:/api/v1/masters:{}").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern_single_char_wildcard() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set_ex("cache:calls:1", "a".into(), ttl).await.unwrap();
        store.set_ex("cache:calls:10", "b".into(), ttl).await.unwrap();

        assert_eq!(store.delete_pattern("cache:calls:?").await.unwrap(), 1);
        assert!(store.get("cache:calls:10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_an_error() {
        let store = MemoryStore::new();
        let result = store.delete_pattern("cache:[").await;
        assert!(matches!(result, Err(CacheError::InvalidPattern { .. })));
    }
}
