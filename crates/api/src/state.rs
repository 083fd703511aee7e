//! Application state for the API server.

use agora_coordinator::{RouterConfig, TaskRouter};
use std::time::Instant;

use crate::auth::ApiKey;

/// Shared application state for the API server.
pub struct AppState {
    /// Owns every agent, the catalog and the negotiation history
    pub router: TaskRouter,

    /// Bearer key required on every route except `/health`
    pub api_key: Option<ApiKey>,

    /// Server start time (for health checks)
    pub start_time: Instant,
}

impl AppState {
    /// Build the router described by `config`.
    pub fn new(config: &RouterConfig) -> agora_common::Result<Self> {
        Ok(Self::from_router(TaskRouter::from_config(config)?))
    }

    pub fn from_router(router: TaskRouter) -> Self {
        Self {
            router,
            api_key: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
