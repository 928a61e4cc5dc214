//! CRM API Server
//!
//! REST API for a service-dispatch CRM (orders, masters, cash, calls and
//! directors) with a Redis-backed read-through response cache.
//!
//! # Architecture
//!
//! - **Routes**: HTTP endpoint definitions per resource collection
//! - **Middleware**: read-through caching for reads, pattern invalidation
//!   for writes
//! - **Cache**: [`cache::CacheClient`], a no-op unless running in
//!   production mode with a Redis URL
//! - **Records**: in-process record storage behind the handlers
//!
//! The cache client is created once at startup, shared through
//! [`AppState`], and closed by [`Server::run`] after the HTTP server has
//! drained.

#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod records;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Server builder for constructing and running the API server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server and start connecting the cache in the background.
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState::new(config.clone());

        if state.cache.connect().is_some() {
            info!("Response cache enabled");
        } else {
            info!("Response cache disabled");
        }

        Self { config, state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// Run the server until a shutdown signal, then release the cache.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.config.server.bind_addr();
        let result = serve(&addr, self.router()).await;

        self.state.cache.close();
        if let Err(e) = &result {
            warn!(error = %e, "Server stopped with error");
        }
        result
    }
}

async fn serve(addr: &str, router: Router) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
