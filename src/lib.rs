//! Clearway - Agent-pooling HTTP proxy
//!
//! Forwards HTTP calls through a pool of long-lived outbound clients ("agents"),
//! each holding its own cookie jar and browser identity.
//!
//! ## Features
//!
//! - Persistent agents addressable by id, plus throwaway ephemeral agents
//! - Caller-to-agent affinity through a cookie
//! - Header and cookie filtering so the agent's identity is never contradicted
//! - Response normalization (dechunking, gzip decoding)
//! - Optional egress proxy shared by all agents

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;

pub use config::Config;
pub use error::{ClearwayError, Result};
