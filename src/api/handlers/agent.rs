//! Persistent agent lifecycle handlers

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use super::options_from_body;
use crate::api::server::AppState;
use crate::error::ClearwayError;
use crate::models::{AgentIdResponse, MessageResponse};
use crate::proxy::forwarder::parse_agent_id;

/// Create a persistent agent from optional JSON options
pub async fn create_agent(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ClearwayError> {
    let overrides = options_from_body(&body)?;
    let (id, _) = state.forwarder.create_agent(&overrides)?;

    Ok((StatusCode::CREATED, Json(AgentIdResponse { id })))
}

/// Identity of a persistent agent
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ClearwayError> {
    let id = parse_agent_id(&id)?;
    let agent = state
        .pool
        .get(id)
        .ok_or(ClearwayError::AgentNotFound { id })?;

    Ok(Json(agent.identity()))
}

/// Delete a single agent
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ClearwayError> {
    let id = parse_agent_id(&id)?;
    if !state.pool.delete(id) {
        return Err(ClearwayError::AgentNotFound { id });
    }

    Ok(Json(AgentIdResponse { id }))
}

/// Delete every agent and restart ids
pub async fn delete_all_agents(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.pool.len();
    state.pool.clear();
    info!(removed, "All agents deleted");

    Json(MessageResponse {
        message: "All agents deleted".to_string(),
    })
}
