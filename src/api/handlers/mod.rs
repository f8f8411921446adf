//! Request handlers

pub mod agent;
pub mod ephemeral;
pub mod health;
pub mod proxy;

use bytes::Bytes;

use crate::error::{ClearwayError, Result};
use crate::models::AgentOptions;

/// Agent options from an optional JSON body. An empty body means no overrides.
pub(crate) fn options_from_body(body: &Bytes) -> Result<AgentOptions> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AgentOptions::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ClearwayError::InvalidRequest(format!("invalid agent options: {}", e)))
}
