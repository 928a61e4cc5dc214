//! Cache store trait definition.

use async_trait::async_trait;
use std::time::Duration;

/// Cache operation result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Invalid key pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Key-value backend holding JSON text with per-key expiry.
///
/// Implementations must be safe to share across concurrently running
/// requests. Values are opaque strings; encoding is the caller's concern.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the raw value stored under `key`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Remove a single key.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every key matching a glob pattern, returning how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
}
