//! Contract between the proxy core and the outbound HTTP client
//!
//! The core never knows how an agent talks to the network. It hands an
//! [`AgentFactory`] a set of options and gets back an [`AgentClient`] that can
//! perform requests and report the identity it presents.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::Result;
use crate::models::{AgentIdentity, AgentOptions};

/// Agent identifier
pub type AgentId = u64;

/// Name of the cookie a clearance-solving client stores its session under
pub const CLEARANCE_COOKIE: &str = "cf_clearance";

/// A request dispatched through an agent
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Cookies to send in addition to the agent's own jar; these win on name clashes
    pub cookies: Vec<(String, String)>,
    pub body: Bytes,
}

impl AgentRequest {
    /// A bodiless GET with no extra headers or cookies
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }
}

/// Body of an upstream response as it came off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamBody {
    /// Fully buffered body
    Full(Bytes),
    /// Body delivered as a sequence of transfer chunks
    Chunked(Vec<Bytes>),
}

/// Raw response returned by an agent before normalization
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

/// A stateful outbound HTTP client with its own cookie jar and default headers.
///
/// A single call to [`AgentClient::request`] may perform several round trips
/// (redirects, challenge pages); callers see one complete response or an error.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Perform a request and return the complete upstream response
    async fn request(&self, request: AgentRequest) -> Result<UpstreamResponse>;

    /// User-agent string sent with every request
    fn user_agent(&self) -> String;

    /// Current value of a cookie in the agent's jar
    fn cookie(&self, name: &str) -> Option<String>;

    /// Identity presented to destination sites
    fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            user_agent: self.user_agent(),
            cf_clearance: self.cookie(CLEARANCE_COOKIE).unwrap_or_default(),
        }
    }
}

/// Builds agents from configuration options
pub trait AgentFactory: Send + Sync {
    /// Construct a new agent.
    ///
    /// Returns `AgentCreation` if the options can't be honored or the
    /// underlying client can't be built.
    fn create(&self, options: &AgentOptions) -> Result<Arc<dyn AgentClient>>;
}
