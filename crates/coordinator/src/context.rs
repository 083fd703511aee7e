//! Shared router state.

use agora_common::Agent;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::CapabilityCatalog;
use crate::config::HistoryConfig;
use crate::history::{CollaborationLog, NegotiationLog};
use crate::registry::AgentRegistry;

/// State shared by every routing, negotiation and collaboration call.
///
/// Owned by one [`TaskRouter`](crate::TaskRouter) and handed to its
/// components by reference. Locks are held only for short synchronous
/// sections, never across agent or network calls.
#[derive(Debug)]
pub struct RouterContext {
    pub catalog: RwLock<CapabilityCatalog>,
    pub registry: RwLock<AgentRegistry>,
    pub negotiations: RwLock<NegotiationLog>,
    pub collaborations: RwLock<CollaborationLog>,
}

impl RouterContext {
    pub fn new(catalog: CapabilityCatalog, history: &HistoryConfig) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            registry: RwLock::new(AgentRegistry::new()),
            negotiations: RwLock::new(NegotiationLog::new(history.negotiation_capacity)),
            collaborations: RwLock::new(CollaborationLog::new(history.collaborations_per_agent)),
        }
    }

    /// Register a live agent and its profile in one step.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) {
        self.catalog
            .write()
            .await
            .register_descriptor(agent.descriptor());
        self.registry.write().await.register(agent);
    }
}

impl Default for RouterContext {
    fn default() -> Self {
        Self::new(CapabilityCatalog::new(), &HistoryConfig::default())
    }
}
