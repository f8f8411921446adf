//! Agents and the pool that owns them
//!
//! This module provides:
//! - The collaborator contract for outbound clients (`AgentFactory` / `AgentClient`)
//! - The concurrency-safe agent pool
//! - A `reqwest`-backed agent with its own cookie jar and generated user agent

pub mod client;
pub mod cookies;
pub mod transport;
pub mod pool;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    AgentClient, AgentFactory, AgentId, AgentRequest, UpstreamBody, UpstreamResponse,
    CLEARANCE_COOKIE,
};
pub use cookies::AgentCookieJar;
pub use transport::{HttpAgent, HttpAgentFactory};
pub use pool::{AgentHandle, AgentPool, FIRST_AGENT_ID};
