//! Per-agent cookie jar
//!
//! Implements reqwest's `CookieStore` so the client fills it while following
//! redirects, and keeps cookies enumerable by name for identity inspection.

use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use http::HeaderValue;
use parking_lot::RwLock;
use reqwest::cookie::CookieStore;
use tracing::trace;
use url::Url;

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    expires: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires, Some(at) if at <= now)
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn matches(&self, url: &Url, now: DateTime<Utc>) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(&host, &self.domain)
        };

        domain_ok
            && path_match(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }
}

/// Cookie jar owned by a single agent
#[derive(Debug, Default)]
pub struct AgentCookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl AgentCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `Set-Cookie` value received from `url`
    pub fn store(&self, set_cookie: &str, url: &Url) {
        let Ok(parsed) = Cookie::parse(set_cookie) else {
            trace!(%url, "Ignoring unparsable Set-Cookie");
            return;
        };
        let Some(host) = url.host_str() else {
            return;
        };
        let host = host.to_ascii_lowercase();

        let (domain, host_only) = match parsed.domain() {
            Some(domain) if !domain.is_empty() => {
                let domain = domain.trim_start_matches('.').to_ascii_lowercase();
                if !domain_match(&host, &domain) {
                    trace!(%url, cookie_domain = %domain, "Rejecting cookie for foreign domain");
                    return;
                }
                if !domain.contains('.') {
                    // A single-label Domain (`com`, `localhost`) only ever binds its own host
                    if domain != host {
                        trace!(%url, cookie_domain = %domain, "Rejecting cookie for bare suffix");
                        return;
                    }
                    (domain, true)
                } else {
                    (domain, false)
                }
            }
            _ => (host, true),
        };

        let path = match parsed.path() {
            Some(path) if path.starts_with('/') => path.to_string(),
            _ => default_path(url),
        };

        let now = Utc::now();
        let expires = match parsed.max_age() {
            Some(max_age) => Some(now + Duration::seconds(max_age.whole_seconds())),
            None => parsed
                .expires_datetime()
                .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0)),
        };

        let cookie = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            host_only,
            path,
            secure: parsed.secure().unwrap_or(false),
            expires,
        };

        let mut cookies = self.cookies.write();
        cookies.retain(|existing| !existing.same_slot(&cookie));
        if !cookie.is_expired(now) {
            cookies.push(cookie);
        }
    }

    /// Most recently stored live value of a cookie, whatever its domain
    pub fn get(&self, name: &str) -> Option<String> {
        let now = Utc::now();
        self.cookies
            .read()
            .iter()
            .rev()
            .find(|c| c.name == name && !c.is_expired(now))
            .map(|c| c.value.clone())
    }

    /// Name/value pairs that apply to a request to `url`
    pub fn matching(&self, url: &Url) -> Vec<(String, String)> {
        let now = Utc::now();
        let cookies = self.cookies.read();
        let mut matched: Vec<&StoredCookie> =
            cookies.iter().filter(|c| c.matches(url, now)).collect();
        // Longer paths first
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matched
            .into_iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// `Cookie` header for a request to `url`, with `extra` overriding jar entries
    pub fn header_for(&self, url: &Url, extra: &[(String, String)]) -> Option<HeaderValue> {
        let mut pairs: Vec<(String, String)> = self
            .matching(url)
            .into_iter()
            .filter(|(name, _)| !extra.iter().any(|(n, _)| n == name))
            .collect();
        pairs.extend(extra.iter().cloned());

        if pairs.is_empty() {
            return None;
        }

        let header = pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieStore for AgentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for value in cookie_headers {
            if let Ok(raw) = value.to_str() {
                self.store(raw, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url, &[])
    }
}

fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_store_and_get_by_name() {
        let jar = AgentCookieJar::new();
        jar.store("cf_clearance=abc123; Path=/; HttpOnly", &url("https://example.com/"));

        assert_eq!(jar.get("cf_clearance").as_deref(), Some("abc123"));
        assert!(jar.get("missing").is_none());
    }

    #[test]
    fn test_newer_value_replaces_older() {
        let jar = AgentCookieJar::new();
        let site = url("https://example.com/");
        jar.store("session=one", &site);
        jar.store("session=two", &site);

        assert_eq!(jar.get("session").as_deref(), Some("two"));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_expired_cookie_removes_entry() {
        let jar = AgentCookieJar::new();
        let site = url("https://example.com/");
        jar.store("session=one", &site);
        jar.store("session=gone; Max-Age=0", &site);

        assert!(jar.get("session").is_none());
        assert!(jar.is_empty());
    }

    #[test]
    fn test_host_only_cookie_does_not_leak_to_subdomain() {
        let jar = AgentCookieJar::new();
        jar.store("a=1", &url("https://example.com/"));

        assert_eq!(jar.matching(&url("https://example.com/x")).len(), 1);
        assert!(jar.matching(&url("https://sub.example.com/")).is_empty());
    }

    #[test]
    fn test_domain_cookie_applies_to_subdomains() {
        let jar = AgentCookieJar::new();
        jar.store("a=1; Domain=.example.com", &url("https://www.example.com/"));

        assert_eq!(jar.matching(&url("https://api.example.com/")).len(), 1);
        assert!(jar.matching(&url("https://notexample.com/")).is_empty());
    }

    #[test]
    fn test_foreign_domain_is_rejected() {
        let jar = AgentCookieJar::new();
        jar.store("a=1; Domain=other.com", &url("https://example.com/"));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_bare_suffix_domain_is_rejected() {
        let jar = AgentCookieJar::new();
        jar.store("tracker=evil; Domain=com", &url("https://attacker.com/"));
        jar.store("tracker=evil; Domain=.com", &url("https://attacker.com/"));

        assert!(jar.is_empty());
        assert!(jar.header_for(&url("https://bank.com/"), &[]).is_none());
    }

    #[test]
    fn test_single_label_host_keeps_its_own_cookie() {
        let jar = AgentCookieJar::new();
        jar.store("a=1; Domain=localhost", &url("http://localhost:8080/"));

        assert_eq!(jar.matching(&url("http://localhost/x")).len(), 1);
        assert!(jar.matching(&url("http://sub.localhost/")).is_empty());
    }

    #[test]
    fn test_path_and_secure_scoping() {
        let jar = AgentCookieJar::new();
        let site = url("https://example.com/");
        jar.store("scoped=1; Path=/app", &site);
        jar.store("secret=1; Secure", &site);

        let names = |u: &str| -> Vec<String> {
            jar.matching(&url(u)).into_iter().map(|(n, _)| n).collect()
        };
        assert_eq!(names("https://example.com/app/page"), vec!["scoped", "secret"]);
        assert_eq!(names("https://example.com/application"), vec!["secret"]);
        assert!(names("http://example.com/other").is_empty());
    }

    #[test]
    fn test_header_for_lets_extra_cookies_win() {
        let jar = AgentCookieJar::new();
        let site = url("https://example.com/");
        jar.store("a=jar", &site);
        jar.store("b=jar", &site);

        let header = jar
            .header_for(&site, &[("a".to_string(), "caller".to_string())])
            .unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("b=jar"));
        assert!(header.contains("a=caller"));
        assert!(!header.contains("a=jar"));
    }

    #[test]
    fn test_header_for_empty_jar_is_none() {
        let jar = AgentCookieJar::new();
        assert!(jar.header_for(&url("https://example.com/"), &[]).is_none());
    }

    #[test]
    fn test_cookie_store_trait_round_trip() {
        let jar = AgentCookieJar::new();
        let site = url("https://example.com/");
        let values = [
            HeaderValue::from_static("a=1"),
            HeaderValue::from_static("b=2; Path=/"),
        ];
        jar.set_cookies(&mut values.iter(), &site);

        let header = jar.cookies(&site).unwrap();
        assert_eq!(header.to_str().unwrap(), "a=1; b=2");
    }
}
