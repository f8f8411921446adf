//! Proxy core
//!
//! This module turns an inbound call into an upstream call made by an agent:
//! - Header and affinity-cookie filtering
//! - Agent resolution and dispatch
//! - Response normalization (dechunking, gzip decoding)

pub mod filter;
pub mod forwarder;
pub mod normalize;

pub use filter::{affinity_set_cookie, filter_cookies, filter_headers, AFFINITY_COOKIE};
pub use forwarder::{ForwardRequest, ForwardedResponse, ProxyForwarder};
pub use normalize::{normalize_response, NormalizedResponse};
