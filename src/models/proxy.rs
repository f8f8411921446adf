use serde::Deserialize;

/// Query parameters accepted by the proxy endpoint.
///
/// Both fields are optional at the extractor level so missing or malformed
/// values surface as service errors instead of framework rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyQuery {
    pub dst: Option<String>,
    pub agent_id: Option<String>,
}

/// Query parameters accepted by the ephemeral agent endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EphemeralQuery {
    pub url: Option<String>,
}
