use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::agent::AgentId;

/// Unified error type for the Clearway service
#[derive(Error, Debug)]
pub enum ClearwayError {
    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    // Agent errors
    #[error("Agent not found: {id}")]
    AgentNotFound { id: AgentId },

    #[error("Couldn't create an agent: {0}")]
    AgentCreation(String),

    // Upstream errors
    #[error("Upstream request failed: {0}")]
    UpstreamRequest(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Clearway operations
pub type Result<T> = std::result::Result<T, ClearwayError>;

impl ClearwayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ClearwayError::InvalidRequest(_) | ClearwayError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }

            // 422 Unprocessable Entity
            ClearwayError::MissingParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 404 Not Found
            ClearwayError::AgentNotFound { .. } => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            ClearwayError::AgentCreation(_)
            | ClearwayError::UpstreamRequest(_)
            | ClearwayError::Io(_)
            | ClearwayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for ClearwayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        }
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for ClearwayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClearwayError::UpstreamRequest(format!("timed out: {}", err))
        } else {
            ClearwayError::UpstreamRequest(err.to_string())
        }
    }
}

impl From<url::ParseError> for ClearwayError {
    fn from(err: url::ParseError) -> Self {
        ClearwayError::InvalidRequest(format!("invalid destination URL: {}", err))
    }
}

impl From<serde_yaml::Error> for ClearwayError {
    fn from(err: serde_yaml::Error) -> Self {
        ClearwayError::InvalidConfig(err.to_string())
    }
}
