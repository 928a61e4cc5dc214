//! Redis cache store.

use super::store::{CacheError, CacheResult, CacheStore};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, RedisError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Redis-backed store sharing one multiplexed connection.
///
/// The connection is opened on first use (or by [`RedisStore::warm_up`]) and
/// reopened on the next operation after the server drops it. Operations
/// issued while the connection cannot be established fail with
/// [`CacheError::Connection`].
pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Parse the URL and prepare a client. No network I/O happens here.
    pub fn open(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    /// Establish the shared connection, logging the outcome.
    pub async fn warm_up(&self) {
        if let Err(e) = self.connection().await {
            error!(error = %e, "Redis connection failed");
        }
    }

    async fn connection(&self) -> CacheResult<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!("Redis connection established");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Map a command failure, forgetting the connection if it was lost.
    async fn backend_error(&self, err: RedisError) -> CacheError {
        if err.is_connection_dropped() || err.is_io_error() {
            warn!(error = %err, "Redis connection lost");
            self.connection.lock().await.take();
            return CacheError::Connection(err.to_string());
        }
        CacheError::Backend(err.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.backend_error(e).await),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;

        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, seconds).await {
            return Err(self.backend_error(e).await);
        }

        debug!(key = key, ttl_secs = seconds, "Redis SETEX");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;

        if let Err(e) = conn.del::<_, ()>(key).await {
            return Err(self.backend_error(e).await);
        }
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection().await?;

        let keys: Vec<String> = match conn.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => return Err(self.backend_error(e).await),
        };

        if keys.is_empty() {
            return Ok(0);
        }

        match conn.del::<_, u64>(&keys).await {
            Ok(deleted) => Ok(deleted),
            Err(e) => Err(self.backend_error(e).await),
        }
    }
}
