//! Server configuration types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Response cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum accepted request body.
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_request_body_limit() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            request_body_limit: default_request_body_limit(),
        }
    }
}

impl ServerBindConfig {
    /// `host:port` for binding; the host may be a name.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Execution mode of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
    Test,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// Response cache configuration.
///
/// Caching is active only in production mode with a non-empty Redis URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Execution mode; only `production` enables the cache.
    #[serde(default)]
    pub mode: RunMode,
    /// Redis connection URL.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// TTL for direct client writes.
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
    /// TTL for responses stored by the read-through middleware.
    #[serde(default = "default_read_through_ttl")]
    pub read_through_ttl_secs: u64,
    /// Largest response body the read-through middleware will store.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_read_through_ttl() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            redis_url: None,
            default_ttl_secs: default_cache_ttl(),
            read_through_ttl_secs: default_read_through_ttl(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl CacheConfig {
    /// The Redis URL, if caching should be active.
    pub fn active_url(&self) -> Option<&str> {
        if self.mode != RunMode::Production {
            return None;
        }
        self.redis_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.active_url().is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn read_through_ttl(&self) -> Duration {
        Duration::from_secs(self.read_through_ttl_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact or json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
