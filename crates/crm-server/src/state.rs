//! Shared application state.

use crate::cache::CacheClient;
use crate::config::ServerConfig;
use crate::records::RecordStore;
use std::sync::Arc;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub cache: CacheClient,
    pub records: Arc<RecordStore>,
}

impl AppState {
    /// Build state with a cache client created from `config`.
    pub fn new(config: ServerConfig) -> Self {
        let cache = CacheClient::new(config.cache.clone());
        Self::with_cache(config, cache)
    }

    /// Build state around an existing cache client.
    pub fn with_cache(config: ServerConfig, cache: CacheClient) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            records: Arc::new(RecordStore::new()),
        }
    }
}
