//! Outbound agents backed by `reqwest`
//!
//! Each agent owns a dedicated client: its own connection pool, cookie jar and
//! default headers, so nothing leaks between identities.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use http::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use http::{HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use super::client::{AgentClient, AgentFactory, AgentRequest, UpstreamBody, UpstreamResponse};
use super::cookies::AgentCookieJar;
use super::user_agent;
use crate::config::{AgentConfig, EgressProxyConfig, EgressProxyProtocol};
use crate::error::{ClearwayError, Result};
use crate::models::AgentOptions;
use crate::proxy::normalize::is_chunked;

const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Builds [`HttpAgent`]s sharing transport settings
#[derive(Debug, Clone)]
pub struct HttpAgentFactory {
    connect_timeout: Duration,
    request_timeout: Duration,
    egress_proxy: Option<EgressProxyConfig>,
}

impl HttpAgentFactory {
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
        egress_proxy: Option<EgressProxyConfig>,
    ) -> Self {
        Self {
            connect_timeout,
            request_timeout,
            egress_proxy,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            Duration::from_secs(config.connect_timeout),
            Duration::from_secs(config.request_timeout),
            config.egress_proxy.clone(),
        )
    }

    fn egress(&self) -> Result<Option<reqwest::Proxy>> {
        let Some(egress) = &self.egress_proxy else {
            return Ok(None);
        };

        let proxy = reqwest::Proxy::all(egress.url())
            .map_err(|e| ClearwayError::AgentCreation(format!("invalid egress proxy: {}", e)))?;

        let proxy = match (&egress.username, &egress.password) {
            (Some(username), Some(password)) => proxy.basic_auth(username, password),
            (Some(username), None) if egress.protocol == EgressProxyProtocol::Http => {
                proxy.basic_auth(username, "")
            }
            _ => proxy,
        };
        Ok(Some(proxy))
    }
}

impl AgentFactory for HttpAgentFactory {
    fn create(&self, options: &AgentOptions) -> Result<Arc<dyn AgentClient>> {
        let browser = options.browser_options();
        let user_agent = user_agent::generate(&browser);

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(|e| {
                ClearwayError::AgentCreation(format!("invalid user agent: {}", e))
            })?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(user_agent::accept_header(browser.browser)),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
        );

        let jar = Arc::new(AgentCookieJar::new());

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .gzip(true)
            .deflate(true)
            .brotli(options.allow_brotli.unwrap_or(false))
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);

        if let Some(proxy) = self.egress()? {
            builder = builder.proxy(proxy);
        }

        // Solver settings; not applied by this transport
        debug!(
            interpreter = ?options.interpreter,
            cipher_suite = ?options.cipher_suite,
            ecdh_curve = ?options.ecdh_curve,
            delay = ?options.delay,
            extra = options.extra.len(),
            "Building agent client"
        );

        let client = builder
            .build()
            .map_err(|e| ClearwayError::AgentCreation(e.to_string()))?;

        Ok(Arc::new(HttpAgent {
            client,
            user_agent,
            jar,
        }))
    }
}

/// A browser-like HTTP client with its own cookie jar
pub struct HttpAgent {
    client: reqwest::Client,
    user_agent: String,
    jar: Arc<AgentCookieJar>,
}

#[async_trait]
impl AgentClient for HttpAgent {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn request(&self, request: AgentRequest) -> Result<UpstreamResponse> {
        let AgentRequest {
            method,
            url,
            mut headers,
            cookies,
            body,
        } = request;

        // An explicit Cookie header makes reqwest skip the jar, so merge here.
        headers.remove(COOKIE);
        if let Some(cookie_header) = self.jar.header_for(&url, &cookies) {
            headers.insert(COOKIE, cookie_header);
        }

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = if is_chunked(&headers) {
            let mut chunks = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                chunks.push(chunk?);
            }
            UpstreamBody::Chunked(chunks)
        } else {
            UpstreamBody::Full(response.bytes().await?)
        };

        debug!(status = status.as_u16(), "Upstream responded");
        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.jar.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Browser, BrowserOptions};

    fn factory() -> HttpAgentFactory {
        HttpAgentFactory::new(Duration::from_secs(1), Duration::from_secs(1), None)
    }

    #[test]
    fn test_create_uses_custom_user_agent() {
        let options = AgentOptions {
            browser: Some(BrowserOptions {
                browser: Browser::Firefox,
                custom_ua: Some("CustomAgent/2.0".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let agent = factory().create(&options).unwrap();
        assert_eq!(agent.user_agent(), "CustomAgent/2.0");
    }

    #[test]
    fn test_fresh_agent_has_empty_clearance() {
        let agent = factory().create(&AgentOptions::default()).unwrap();
        let identity = agent.identity();

        assert!(!identity.user_agent.is_empty());
        assert_eq!(identity.cf_clearance, "");
    }

    #[test]
    fn test_user_agent_with_control_chars_is_creation_error() {
        let options = AgentOptions {
            browser: Some(BrowserOptions {
                custom_ua: Some("bad\nagent".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = factory().create(&options).err().unwrap();
        assert!(matches!(err, ClearwayError::AgentCreation(_)));
    }

    async fn spawn_upstream() -> std::net::SocketAddr {
        use axum::body::Body;
        use axum::routing::get;

        let app = axum::Router::new()
            .route(
                "/stream",
                get(|| async {
                    let chunks = futures::stream::iter(vec![
                        Ok::<_, std::convert::Infallible>(bytes::Bytes::from_static(b"ab")),
                        Ok(bytes::Bytes::from_static(b"cd")),
                    ]);
                    (
                        [(http::header::SET_COOKIE, "cf_clearance=tok; Path=/")],
                        Body::from_stream(chunks),
                    )
                }),
            )
            .route(
                "/echo",
                get(|headers: HeaderMap| async move {
                    headers
                        .get(COOKIE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn body_of(body: &UpstreamBody) -> Vec<u8> {
        match body {
            UpstreamBody::Full(bytes) => bytes.to_vec(),
            UpstreamBody::Chunked(chunks) => chunks.concat(),
        }
    }

    #[tokio::test]
    async fn test_request_collects_chunks_and_fills_jar() {
        let addr = spawn_upstream().await;
        let agent = factory().create(&AgentOptions::default()).unwrap();

        let url = url::Url::parse(&format!("http://{}/stream", addr)).unwrap();
        let response = agent.request(AgentRequest::get(url)).await.unwrap();

        assert_eq!(response.status, http::StatusCode::OK);
        assert!(is_chunked(&response.headers));
        assert!(matches!(response.body, UpstreamBody::Chunked(_)));
        assert_eq!(body_of(&response.body), b"abcd");
        assert_eq!(agent.identity().cf_clearance, "tok");
    }

    #[tokio::test]
    async fn test_request_merges_jar_and_caller_cookies() {
        let addr = spawn_upstream().await;
        let agent = factory().create(&AgentOptions::default()).unwrap();

        let stream = url::Url::parse(&format!("http://{}/stream", addr)).unwrap();
        agent.request(AgentRequest::get(stream)).await.unwrap();

        let echo = url::Url::parse(&format!("http://{}/echo", addr)).unwrap();
        let mut request = AgentRequest::get(echo);
        request.cookies = vec![("caller".to_string(), "x".to_string())];
        request
            .headers
            .insert(COOKIE, HeaderValue::from_static("ignored=1"));
        let response = agent.request(request).await.unwrap();

        assert_eq!(body_of(&response.body), b"cf_clearance=tok; caller=x");
    }

    #[test]
    fn test_egress_proxy_is_accepted() {
        let factory = HttpAgentFactory::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            Some(EgressProxyConfig {
                protocol: EgressProxyProtocol::Http,
                host: "127.0.0.1".to_string(),
                port: 3128,
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
            }),
        );
        assert!(factory.create(&AgentOptions::default()).is_ok());
    }
}
