//! Clearway - Entry Point
//!
//! Loads configuration, builds the agent pool and serves until a shutdown signal.

use std::sync::Arc;

use clearway::agent::{AgentPool, HttpAgentFactory};
use clearway::api::ApiServer;
use clearway::config::LogConfig;
use clearway::{Config, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Clearway");
    info!(
        agent_defaults = config.agents.defaults.len(),
        resolution = config.agents.resolution.as_str(),
        egress_proxy = config.agents.egress_proxy.is_some(),
        "Configuration loaded"
    );

    let factory = Arc::new(HttpAgentFactory::from_config(&config.agents));
    let pool = Arc::new(AgentPool::new(factory));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = ApiServer::new(config.clone(), pool.clone());

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("Server error: {}", e);
        }
    });

    info!("Server started on {}", config.server_addr());

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = server_task.await;

    info!(agents = pool.len(), "Clearway stopped");
    Ok(())
}

/// `RUST_LOG` wins over `LOG_LEVEL`
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("clearway={},tower_http=info", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("pretty") {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
