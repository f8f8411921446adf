//! Route definitions

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::server::AppState;

/// Create the router with all routes mounted under the configured web root
pub fn create_router(state: AppState) -> Router {
    let web_root = state.config.server.web_root.clone();
    let routes = service_routes();

    let router = if web_root == "/" {
        routes
    } else {
        Router::new().nest(&web_root, routes)
    };

    router.with_state(state)
}

fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Persistent agents
        .route(
            "/agent/persistent",
            post(handlers::agent::create_agent).delete(handlers::agent::delete_all_agents),
        )
        .route(
            "/agent/persistent/:id",
            get(handlers::agent::get_agent).delete(handlers::agent::delete_agent),
        )
        // Ephemeral agents
        .route("/agent/ephemeral", post(handlers::ephemeral::create_ephemeral))
        // Forwarding
        .route(
            "/proxy",
            get(handlers::proxy::forward)
                .post(handlers::proxy::forward)
                .put(handlers::proxy::forward)
                .delete(handlers::proxy::forward)
                .patch(handlers::proxy::forward),
        )
}
