//! Configuration validation.

use super::types::ServerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid {0}: must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid Redis URL {url:?}: {reason}")]
    InvalidRedisUrl { url: String, reason: String },
}

const REDIS_SCHEMES: [&str; 4] = ["redis", "rediss", "unix", "redis+unix"];

/// Validate server configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigError::ZeroValue("server.request_timeout_secs"));
    }

    if config.cache.default_ttl_secs == 0 {
        errors.push(ConfigError::ZeroValue("cache.default_ttl_secs"));
    }

    if config.cache.read_through_ttl_secs == 0 {
        errors.push(ConfigError::ZeroValue("cache.read_through_ttl_secs"));
    }

    if config.cache.max_body_bytes == 0 {
        errors.push(ConfigError::ZeroValue("cache.max_body_bytes"));
    }

    // Only an active cache is worth checking; an unused URL is ignored.
    if let Some(url) = config.cache.active_url() {
        match url::Url::parse(url) {
            Ok(parsed) if REDIS_SCHEMES.contains(&parsed.scheme()) => {}
            Ok(parsed) => errors.push(ConfigError::InvalidRedisUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            }),
            Err(e) => errors.push(ConfigError::InvalidRedisUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if crm_common_log::LogLevel::parse(&config.logging.level).is_none() {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
