//! CRM Server Binary

use anyhow::{bail, Result};
use crm_common_log::{LogConfig, LogFormat, LogLevel};
use crm_server::{
    config::{load_config, validate_config, LoadedConfig},
    Server,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let LoadedConfig { config, notices } = load_config()?;

    let mut log_config = LogConfig::from_env();
    if std::env::var("CRM_LOG_LEVEL").is_err() {
        if let Some(level) = LogLevel::parse(&config.logging.level) {
            log_config = log_config.with_level(level);
        }
    }
    if std::env::var("CRM_LOG_FORMAT").is_err() {
        log_config = log_config.with_format(LogFormat::parse(&config.logging.format));
    }
    crm_common_log::init(log_config)?;

    for notice in &notices {
        notice.log();
    }

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        bail!("{} configuration error(s)", errors.len());
    }

    info!("Starting CRM Server v{}", env!("CARGO_PKG_VERSION"));

    let server = Server::new(config);
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
