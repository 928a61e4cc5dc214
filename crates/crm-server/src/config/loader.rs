//! Configuration loading utilities.

use super::types::{RunMode, ServerConfig};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable selecting the run mode.
pub const RUN_MODE_VAR: &str = "APP_ENV";
/// Environment variable holding the Redis URL.
pub const REDIS_URL_VAR: &str = "REDIS_URL";

/// Configuration plus what happened while assembling it.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ServerConfig,
    pub notices: Vec<ConfigNotice>,
}

/// Something about how the configuration was assembled that belongs in
/// the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    FileLoaded(String),
    FileMissing(String),
    UnknownRunMode(String),
}

impl ConfigNotice {
    /// Emit through `tracing`; call once logging is initialized.
    pub fn log(&self) {
        match self {
            Self::FileLoaded(path) => info!(path = %path, "Loaded config file"),
            Self::FileMissing(path) => warn!(path = %path, "Config file not found, skipping"),
            Self::UnknownRunMode(value) => warn!(
                value = %value,
                "Unrecognised APP_ENV, running without production cache"
            ),
        }
    }
}

/// Load configuration from layered sources.
///
/// Later sources override earlier ones: embedded defaults, the optional
/// config file, `CRM__SECTION__KEY` variables, then the well-known
/// `APP_ENV` and `REDIS_URL` variables.
pub struct ConfigLoader {
    config_path: Option<String>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "CRM".to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration.
    ///
    /// Nothing is logged here since this usually runs before logging is
    /// installed; what happened is returned as [`ConfigNotice`]s instead.
    pub fn load(&self) -> Result<LoadedConfig> {
        let mut notices = Vec::new();
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("defaults.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
                notices.push(ConfigNotice::FileLoaded(path.clone()));
            } else {
                notices.push(ConfigNotice::FileMissing(path.clone()));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ServerConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        notices.extend(apply_overrides(&mut config, |name| std::env::var(name).ok()));
        Ok(LoadedConfig { config, notices })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `APP_ENV` and `REDIS_URL` on top of the layered configuration.
///
/// An unrecognised `APP_ENV` (`staging`, `qa`, ...) is treated as
/// development, which leaves the cache off.
pub fn apply_overrides(
    config: &mut ServerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<ConfigNotice> {
    let mut notice = None;

    if let Some(mode) = lookup(RUN_MODE_VAR) {
        config.cache.mode = match mode.parse::<RunMode>() {
            Ok(mode) => mode,
            Err(_) => {
                notice = Some(ConfigNotice::UnknownRunMode(mode));
                RunMode::Development
            }
        };
    }

    if let Some(url) = lookup(REDIS_URL_VAR) {
        config.cache.redis_url = Some(url);
    }

    notice
}

/// Load configuration from the environment, honouring `CONFIG_PATH`.
pub fn load_config() -> Result<LoadedConfig> {
    let mut loader = ConfigLoader::new();
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        loader = loader.with_config_path(path);
    }

    loader.load()
}
