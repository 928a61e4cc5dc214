//! Shared cache client.

use super::redis::RedisStore;
use super::store::{CacheResult, CacheStore};
use crate::config::CacheConfig;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Handle to the external cache, shared by the middlewares and handlers.
///
/// Cloning is cheap and every clone sees the same connection. When the cache
/// is not configured (see [`CacheConfig::is_active`]) every operation is a
/// no-op: reads miss, writes and deletes are skipped, nothing touches the
/// network.
#[derive(Clone)]
pub struct CacheClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: CacheConfig,
    store: RwLock<Option<Arc<dyn CacheStore>>>,
}

impl CacheClient {
    /// Create a client from configuration. Nothing is connected yet.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                store: RwLock::new(None),
            }),
        }
    }

    /// Create a client already bound to `store`, bypassing the activation
    /// check. Once closed it stays closed unless `config` is active.
    pub fn with_store(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                store: RwLock::new(Some(store)),
            }),
        }
    }

    /// A client that never caches.
    pub fn disabled() -> Self {
        Self::new(CacheConfig::default())
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Whether a store is currently bound.
    pub fn is_connected(&self) -> bool {
        self.inner.store.read().is_some()
    }

    /// Return the shared store, creating it if the cache is configured.
    ///
    /// Idempotent. A new Redis store starts connecting in the background;
    /// the caller is never blocked and connection failures are only logged.
    /// Returns `None` when the cache is not configured.
    pub fn connect(&self) -> Option<Arc<dyn CacheStore>> {
        if let Some(store) = self.inner.store.read().as_ref() {
            return Some(store.clone());
        }

        let url = self.inner.config.active_url()?;

        let mut slot = self.inner.store.write();
        if let Some(store) = slot.as_ref() {
            return Some(store.clone());
        }

        let redis = match RedisStore::open(url) {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                error!(error = %e, "Invalid Redis configuration, caching disabled for this attempt");
                return None;
            }
        };

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let warm = redis.clone();
            handle.spawn(async move { warm.warm_up().await });
        }

        info!("Cache store created");
        let store: Arc<dyn CacheStore> = redis;
        *slot = Some(store.clone());
        Some(store)
    }

    /// Store `value` for the configured default TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.set_with_ttl(key, value, self.inner.config.default_ttl())
            .await
    }

    /// Store `value` as JSON, expiring after `ttl`.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let Some(store) = self.connect() else {
            return Ok(());
        };

        let serialized = serde_json::to_string(value)?;
        store.set_ex(key, serialized, ttl).await?;
        debug!(key = key, ttl_secs = ttl.as_secs(), "Cache set");
        Ok(())
    }

    /// Store already-encoded JSON text, expiring after `ttl`.
    pub async fn set_raw(&self, key: &str, json: String, ttl: Duration) -> CacheResult<()> {
        let Some(store) = self.connect() else {
            return Ok(());
        };

        store.set_ex(key, json, ttl).await?;
        debug!(key = key, ttl_secs = ttl.as_secs(), "Cache set");
        Ok(())
    }

    /// Fetch and decode the value under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Fetch the JSON text under `key` without decoding it.
    pub async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let Some(store) = self.connect() else {
            return Ok(None);
        };

        let value = store.get(key).await?;
        debug!(key = key, hit = value.is_some(), "Cache get");
        Ok(value)
    }

    /// Remove one key.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let Some(store) = self.connect() else {
            return Ok(());
        };

        store.delete(key).await?;
        debug!(key = key, "Cache delete");
        Ok(())
    }

    /// Remove every key matching the glob `pattern`, returning the count.
    pub async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let Some(store) = self.connect() else {
            return Ok(0);
        };

        let deleted = store.delete_pattern(pattern).await?;
        debug!(pattern = pattern, deleted = deleted, "Cache delete pattern");
        Ok(deleted)
    }

    /// Release the store. Safe to call any number of times.
    ///
    /// In-flight operations holding the store finish normally; the
    /// connection closes once the last of them drops it.
    pub fn close(&self) {
        if self.inner.store.write().take().is_some() {
            info!("Cache connection closed");
        }
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("active", &self.inner.config.is_active())
            .field("connected", &self.is_connected())
            .finish()
    }
}
