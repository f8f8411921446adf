//! Forwarding handler

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_LENGTH, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::Response;

use crate::api::server::AppState;
use crate::error::ClearwayError;
use crate::models::ProxyQuery;
use crate::proxy::{affinity_set_cookie, ForwardRequest};

/// Forward the call to `dst` through an agent and relay the response.
///
/// `agent_id` from the query beats the affinity cookie.
pub async fn forward(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ClearwayError> {
    let request = ForwardRequest::from_parts(
        method,
        query.dst.as_deref(),
        query.agent_id.as_deref(),
        &headers,
        body,
    )?;

    let forwarded = state.forwarder.forward(request).await?;

    let mut response = Response::new(Body::from(forwarded.body));
    *response.status_mut() = forwarded.status;

    let out = response.headers_mut();
    for (name, value) in &forwarded.headers {
        // Body was re-framed; the length is recomputed on the way out
        if *name == CONTENT_LENGTH {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    let cookie = affinity_set_cookie(forwarded.agent_id, &state.config.server.web_root);
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ClearwayError::Internal(format!("invalid affinity cookie: {}", e)))?;
    out.append(SET_COOKIE, cookie);

    Ok(response)
}
