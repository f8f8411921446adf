//! Request logging middleware

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info};

/// Request logging middleware
pub struct RequestLogging;

impl RequestLogging {
    /// Log endpoint, method, status, source address and elapsed time of every request
    pub async fn log_request(req: Request<Body>, next: Next) -> Response {
        let method = req.method().clone();
        let endpoint = req
            .extensions()
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let src = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string());
        let start = Instant::now();

        debug!(%method, %endpoint, "Request started");

        let response = next.run(req).await;

        info!(
            %endpoint,
            %method,
            status = response.status().as_u16(),
            %src,
            time_seconds = start.elapsed().as_secs_f64(),
            "Processing request"
        );

        response
    }
}
