//! HTTP surface
//!
//! Agent lifecycle endpoints and the forwarding proxy, served with Axum.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
