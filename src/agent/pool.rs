//! Agent pool
//!
//! Concurrency-safe registry mapping agent ids to agents. A single lock guards
//! the map together with the id counter, so allocating an id and inserting the
//! agent happen as one step. The lock is never held across network calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{AgentClient, AgentFactory, AgentId, AgentRequest, UpstreamResponse};
use crate::error::{ClearwayError, Result};
use crate::models::{AgentIdentity, AgentOptions};

/// Id handed out by the first `create` and by the first `create` after `clear`
pub const FIRST_AGENT_ID: AgentId = 0;

/// Id the counter restarts from once it passes the ceiling
const WRAPPED_AGENT_ID: AgentId = FIRST_AGENT_ID + 1;

/// An agent owned by the pool
pub struct AgentHandle {
    id: AgentId,
    client: Arc<dyn AgentClient>,
    options: AgentOptions,
    created_at: DateTime<Utc>,
    requests: AtomicU64,
    /// Serializes outbound calls made through this agent
    in_flight: Mutex<()>,
}

impl AgentHandle {
    fn new(id: AgentId, client: Arc<dyn AgentClient>, options: AgentOptions) -> Self {
        Self {
            id,
            client,
            options,
            created_at: Utc::now(),
            requests: AtomicU64::new(0),
            in_flight: Mutex::new(()),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of requests dispatched through this agent
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn identity(&self) -> AgentIdentity {
        self.client.identity()
    }

    /// Dispatch a request through this agent.
    ///
    /// Concurrent calls on the same agent wait for each other.
    pub async fn request(&self, request: AgentRequest) -> Result<UpstreamResponse> {
        let _guard = self.in_flight.lock().await;
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.client.request(request).await
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("requests", &self.request_count())
            .finish()
    }
}

struct PoolState {
    next_id: AgentId,
    agents: HashMap<AgentId, Arc<AgentHandle>>,
}

/// Registry of live agents
pub struct AgentPool {
    factory: Arc<dyn AgentFactory>,
    state: RwLock<PoolState>,
    id_ceiling: AgentId,
}

impl AgentPool {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self::with_id_ceiling(factory, AgentId::MAX)
    }

    /// Create a pool whose ids wrap after `id_ceiling` has been handed out
    pub fn with_id_ceiling(factory: Arc<dyn AgentFactory>, id_ceiling: AgentId) -> Self {
        Self {
            factory,
            state: RwLock::new(PoolState {
                next_id: FIRST_AGENT_ID,
                agents: HashMap::new(),
            }),
            id_ceiling: id_ceiling.max(WRAPPED_AGENT_ID),
        }
    }

    /// Factory used to build agents, also used for agents that never enter the pool
    pub fn factory(&self) -> &Arc<dyn AgentFactory> {
        &self.factory
    }

    /// Build a new agent and register it under the next free id.
    ///
    /// The client is constructed before any id is allocated, so a failed
    /// creation leaves the counter untouched.
    pub fn create(&self, options: &AgentOptions) -> Result<(AgentId, Arc<AgentHandle>)> {
        options.validate()?;
        let client = self.factory.create(options)?;

        let mut state = self.state.write();
        let id = self.allocate_id(&mut state)?;
        let handle = Arc::new(AgentHandle::new(id, client, options.clone()));
        state.agents.insert(id, handle.clone());
        let total = state.agents.len();
        drop(state);

        info!(agent_id = id, agents = total, "Created agent");
        Ok((id, handle))
    }

    /// Look up an agent
    pub fn get(&self, id: AgentId) -> Option<Arc<AgentHandle>> {
        self.state.read().agents.get(&id).cloned()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.state.read().agents.contains_key(&id)
    }

    /// Remove an agent. Returns whether it was present.
    pub fn delete(&self, id: AgentId) -> bool {
        let removed = self.state.write().agents.remove(&id);
        match removed {
            Some(handle) => {
                info!(
                    agent_id = id,
                    requests = handle.request_count(),
                    age_seconds = (Utc::now() - handle.created_at()).num_seconds(),
                    "Deleted agent"
                );
                true
            }
            None => {
                debug!(agent_id = id, "Delete requested for unknown agent");
                false
            }
        }
    }

    /// Remove every agent and restart ids from the baseline
    pub fn clear(&self) {
        let mut state = self.state.write();
        let removed = state.agents.len();
        state.agents.clear();
        state.next_id = FIRST_AGENT_ID;
        drop(state);

        info!(removed, "Cleared agent pool");
    }

    pub fn len(&self) -> usize {
        self.state.read().agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all live agents in ascending order
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.state.read().agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Advance the counter until it yields an id nobody holds.
    ///
    /// Ids only repeat after a wrap-around; a still-occupied id is skipped,
    /// never overwritten.
    fn allocate_id(&self, state: &mut PoolState) -> Result<AgentId> {
        for _ in 0..=state.agents.len() {
            let id = state.next_id;
            state.next_id = if id >= self.id_ceiling {
                WRAPPED_AGENT_ID
            } else {
                id + 1
            };

            if !state.agents.contains_key(&id) {
                return Ok(id);
            }
            warn!(agent_id = id, "Agent id still in use after wrap-around, skipping");
        }

        Err(ClearwayError::AgentCreation(
            "no free agent id left".to_string(),
        ))
    }
}
