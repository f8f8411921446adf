//! In-memory agents for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use parking_lot::Mutex;

use super::client::{
    AgentClient, AgentFactory, AgentRequest, UpstreamBody, UpstreamResponse,
};
use crate::error::{ClearwayError, Result};
use crate::models::AgentOptions;

pub const MOCK_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) MockAgent/1.0";

type Responder = Arc<dyn Fn(&AgentRequest) -> Result<UpstreamResponse> + Send + Sync>;

/// Build a plain 200 response
pub fn text_response(body: &'static str) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("text/plain"));
    UpstreamResponse {
        status: StatusCode::OK,
        headers,
        body: UpstreamBody::Full(Bytes::from_static(body.as_bytes())),
    }
}

/// Agent that records requests and answers with a canned response
pub struct MockAgent {
    responder: Responder,
    requests: Mutex<Vec<AgentRequest>>,
    cookies: Mutex<HashMap<String, String>>,
}

impl MockAgent {
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn request(&self, request: AgentRequest) -> Result<UpstreamResponse> {
        let response = (self.responder)(&request);
        self.requests.lock().push(request);
        response
    }

    fn user_agent(&self) -> String {
        MOCK_USER_AGENT.to_string()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).cloned()
    }
}

/// Factory handing out [`MockAgent`]s and keeping them for inspection
pub struct MockAgentFactory {
    responder: Responder,
    agents: Mutex<Vec<Arc<MockAgent>>>,
    options: Mutex<Vec<AgentOptions>>,
    fail_next: AtomicBool,
    created: AtomicUsize,
}

impl MockAgentFactory {
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(text_response("response content")))
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&AgentRequest) -> Result<UpstreamResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            agents: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            created: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_creation(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Agents in creation order
    pub fn agents(&self) -> Vec<Arc<MockAgent>> {
        self.agents.lock().clone()
    }

    /// Options each agent was created with, in creation order
    pub fn options(&self) -> Vec<AgentOptions> {
        self.options.lock().clone()
    }
}

impl AgentFactory for MockAgentFactory {
    fn create(&self, options: &AgentOptions) -> Result<Arc<dyn AgentClient>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ClearwayError::AgentCreation(
                "mock factory refused".to_string(),
            ));
        }

        let agent = Arc::new(MockAgent {
            responder: self.responder.clone(),
            requests: Mutex::new(Vec::new()),
            cookies: Mutex::new(HashMap::new()),
        });
        self.agents.lock().push(agent.clone());
        self.options.lock().push(options.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(agent)
    }
}
