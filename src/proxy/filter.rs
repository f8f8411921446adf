//! Header and cookie filtering for forwarded requests

use cookie::Cookie;
use http::header::{
    HeaderName, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, CONTENT_LENGTH, COOKIE,
    HOST, USER_AGENT,
};
use http::HeaderMap;

use crate::agent::AgentId;

/// Cookie the proxy uses to remember which agent a caller was assigned
pub const AFFINITY_COOKIE: &str = "clearway-agent-id";

/// Inbound headers that are hop-by-hop or would contradict the agent's identity
const DISALLOWED_HEADERS: [HeaderName; 7] = [
    ACCEPT,
    ACCEPT_ENCODING,
    ACCEPT_LANGUAGE,
    CONNECTION,
    CONTENT_LENGTH,
    HOST,
    USER_AGENT,
];

/// Check if a header must not be forwarded upstream
pub fn is_disallowed_header(name: &str) -> bool {
    DISALLOWED_HEADERS
        .iter()
        .any(|h| h.as_str().eq_ignore_ascii_case(name))
}

/// Copy of `headers` without the disallowed ones. Order and repeated values are kept.
pub fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_disallowed_header(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Copy of `cookies` without the affinity cookie
pub fn filter_cookies(cookies: &[(String, String)]) -> Vec<(String, String)> {
    cookies
        .iter()
        .filter(|(name, _)| name != AFFINITY_COOKIE)
        .cloned()
        .collect()
}

/// Name/value pairs from every `Cookie` header, in order
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| {
            Cookie::split_parse(raw)
                .filter_map(|c| c.ok())
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Raw value of the affinity cookie, if the caller sent one
pub fn affinity_cookie(cookies: &[(String, String)]) -> Option<&str> {
    cookies
        .iter()
        .find(|(name, _)| name == AFFINITY_COOKIE)
        .map(|(_, value)| value.as_str())
}

/// `Set-Cookie` value binding the caller to `agent_id`
pub fn affinity_set_cookie(agent_id: AgentId, path: &str) -> String {
    Cookie::build((AFFINITY_COOKIE, agent_id.to_string()))
        .path(path.to_string())
        .build()
        .to_string()
}
