//! Request forwarding through pooled agents
//!
//! A forwarded call picks an agent (explicit id, then affinity cookie, then a
//! freshly provisioned one), strips what would contradict the agent's identity,
//! dispatches through the agent and normalizes what comes back.

use std::sync::Arc;

use bytes::Bytes;
use http::header::COOKIE;
use http::{HeaderMap, Method, StatusCode};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use url::Url;

use super::filter::{affinity_cookie, filter_cookies, filter_headers, parse_cookies};
use super::normalize::normalize_response;
use crate::agent::{AgentHandle, AgentId, AgentPool, AgentRequest};
use crate::config::AgentResolution;
use crate::error::{ClearwayError, Result};
use crate::models::{AgentIdentity, AgentOptions};

/// A caller's request, ready to be forwarded
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub destination: Url,
    /// Agent id given as a query parameter
    pub explicit_agent_id: Option<AgentId>,
    /// Agent id remembered in the affinity cookie
    pub cookie_agent_id: Option<AgentId>,
    /// Inbound headers after filtering, without `Cookie`
    pub headers: HeaderMap,
    /// Inbound cookies after filtering
    pub cookies: Vec<(String, String)>,
    pub body: Bytes,
}

impl ForwardRequest {
    /// Build a forward request from the raw pieces of an inbound call
    pub fn from_parts(
        method: Method,
        dst: Option<&str>,
        agent_id: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Self> {
        let dst = dst.ok_or(ClearwayError::MissingParameter("dst"))?;
        let destination = parse_destination(dst)?;

        let explicit_agent_id = match agent_id.map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(parse_agent_id(raw)?),
        };

        let cookies = parse_cookies(headers);
        let cookie_agent_id = affinity_cookie(&cookies).and_then(|raw| match raw.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(value = raw, "Ignoring malformed affinity cookie");
                None
            }
        });

        let mut headers = filter_headers(headers);
        headers.remove(COOKIE);

        Ok(Self {
            method,
            destination,
            explicit_agent_id,
            cookie_agent_id,
            headers,
            cookies: filter_cookies(&cookies),
            body,
        })
    }
}

/// Normalized upstream response plus the agent that produced it
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub agent_id: AgentId,
}

/// Parse an agent id given by a caller
pub fn parse_agent_id(raw: &str) -> Result<AgentId> {
    raw.trim()
        .parse()
        .map_err(|_| ClearwayError::InvalidRequest(format!("invalid agent id: {}", raw)))
}

/// Percent-decode and parse a destination URL. Only http(s) is forwarded.
pub fn parse_destination(raw: &str) -> Result<Url> {
    let decoded = urlencoding::decode(raw)
        .map_err(|_| ClearwayError::InvalidRequest(format!("invalid destination: {}", raw)))?;
    let url = Url::parse(decoded.trim())?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClearwayError::InvalidRequest(format!(
            "unsupported destination scheme: {}",
            other
        ))),
    }
}

/// Forwards calls through the agent pool
pub struct ProxyForwarder {
    pool: Arc<AgentPool>,
    defaults: Vec<AgentOptions>,
    resolution: AgentResolution,
}

impl ProxyForwarder {
    pub fn new(
        pool: Arc<AgentPool>,
        defaults: Vec<AgentOptions>,
        resolution: AgentResolution,
    ) -> Self {
        let defaults = if defaults.is_empty() {
            vec![AgentOptions::default()]
        } else {
            defaults
        };

        Self {
            pool,
            defaults,
            resolution,
        }
    }

    pub fn pool(&self) -> &Arc<AgentPool> {
        &self.pool
    }

    /// One of the configured default option sets, picked at random
    pub fn default_options(&self) -> AgentOptions {
        let mut rng = rand::thread_rng();
        self.defaults.choose(&mut rng).cloned().unwrap_or_default()
    }

    /// Register a new agent built from `overrides` over a default option set
    pub fn create_agent(&self, overrides: &AgentOptions) -> Result<(AgentId, Arc<AgentHandle>)> {
        let options = overrides.merged_over(&self.default_options());
        self.pool.create(&options)
    }

    /// Pick the agent a call runs through.
    ///
    /// The explicit id beats the cookie id. A cookie id that is no longer in
    /// the pool always falls through to a new agent; an explicit one does so
    /// only under lenient resolution.
    pub fn resolve_agent(
        &self,
        explicit: Option<AgentId>,
        cookie: Option<AgentId>,
    ) -> Result<Arc<AgentHandle>> {
        if let Some(id) = explicit {
            if let Some(handle) = self.pool.get(id) {
                return Ok(handle);
            }
            if self.resolution == AgentResolution::Strict {
                return Err(ClearwayError::AgentNotFound { id });
            }
            debug!(agent_id = id, "Requested agent missing, provisioning a new one");
        } else if let Some(id) = cookie {
            if let Some(handle) = self.pool.get(id) {
                return Ok(handle);
            }
            debug!(agent_id = id, "Affinity cookie names a missing agent, provisioning a new one");
        }

        let (_, handle) = self.create_agent(&AgentOptions::default())?;
        Ok(handle)
    }

    /// Forward a call and return the normalized response
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardedResponse> {
        let ForwardRequest {
            method,
            destination,
            explicit_agent_id,
            cookie_agent_id,
            headers,
            cookies,
            body,
        } = request;

        let agent = self.resolve_agent(explicit_agent_id, cookie_agent_id)?;
        let agent_id = agent.id();

        debug!(agent_id, %method, url = %destination, "Forwarding request");

        let upstream = agent
            .request(AgentRequest {
                method: method.clone(),
                url: destination.clone(),
                headers,
                cookies,
                body,
            })
            .await
            .map_err(|e| {
                warn!(agent_id, %method, url = %destination, error = %e, "Upstream request failed");
                e
            })?;

        let normalized = normalize_response(upstream)?;

        Ok(ForwardedResponse {
            status: normalized.status,
            headers: normalized.headers,
            body: normalized.body,
            agent_id,
        })
    }

    /// Visit `url` with a throwaway agent and report the identity it ended up with
    pub async fn ephemeral_identity(
        &self,
        url: Url,
        overrides: &AgentOptions,
    ) -> Result<AgentIdentity> {
        let options = overrides.merged_over(&self.default_options());
        options.validate()?;

        let client = self.pool.factory().create(&options)?;
        let response = client.request(AgentRequest::get(url.clone())).await?;
        let identity = client.identity();

        info!(
            %url,
            status = response.status.as_u16(),
            cleared = !identity.cf_clearance.is_empty(),
            "Ephemeral agent finished"
        );
        Ok(identity)
    }
}
