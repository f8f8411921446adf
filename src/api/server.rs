//! HTTP server using Axum
//!
//! Serves the agent lifecycle endpoints and the forwarding proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware;
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::agent::AgentPool;
use crate::config::Config;
use crate::error::{ClearwayError, Result};
use crate::proxy::ProxyForwarder;

use super::middleware::{cors_layer, RequestLogging};
use super::routes;

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<AgentPool>,
    pub forwarder: Arc<ProxyForwarder>,
    pub config: Config,
    pub started_at: Instant,
}

impl AppState {
    /// Wire a forwarder around `pool` using the configured defaults and resolution policy
    pub fn new(config: Config, pool: Arc<AgentPool>) -> Self {
        let forwarder = Arc::new(ProxyForwarder::new(
            pool.clone(),
            config.agents.defaults.clone(),
            config.agents.resolution,
        ));

        Self {
            pool,
            forwarder,
            config,
            started_at: Instant::now(),
        }
    }
}

/// HTTP server
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(config: Config, pool: Arc<AgentPool>) -> Self {
        Self {
            state: AppState::new(config, pool),
        }
    }

    /// Build the router with every layer applied
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.state.config.server.cors_origins);

        routes::create_router(self.state.clone())
            .layer(middleware::from_fn(RequestLogging::log_request))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` flips
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self.state.config.server_addr().parse().map_err(|e| {
            ClearwayError::InvalidConfig(format!(
                "invalid listen address {}: {}",
                self.state.config.server_addr(),
                e
            ))
        })?;

        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            web_root = %self.state.config.server.web_root,
            resolution = self.state.config.agents.resolution.as_str(),
            "Listening on {}",
            addr
        );

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|e| ClearwayError::Internal(e.to_string()))?;

        info!("Server shut down");
        Ok(())
    }
}
