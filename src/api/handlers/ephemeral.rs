//! Ephemeral agent handler

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::options_from_body;
use crate::api::server::AppState;
use crate::error::ClearwayError;
use crate::models::EphemeralQuery;
use crate::proxy::forwarder::parse_destination;

/// Visit a site with a throwaway agent and return the identity it earned
pub async fn create_ephemeral(
    State(state): State<AppState>,
    Query(query): Query<EphemeralQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ClearwayError> {
    let raw = query.url.ok_or(ClearwayError::MissingParameter("url"))?;
    let url = parse_destination(&raw)?;
    let overrides = options_from_body(&body)?;

    let identity = state.forwarder.ephemeral_identity(url, &overrides).await?;

    Ok((StatusCode::CREATED, Json(identity)))
}
