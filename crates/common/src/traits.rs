//! Core agent trait and descriptors.
//!
//! Defined in `agora-common` so that both the coordinator and the agent
//! crates can reference them without circular dependencies.

use crate::{Result, TaskRequirement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Static description of an agent, used for catalog registration and for
/// building the text profile that gets embedded for semantic matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,

    /// Human-readable name
    pub name: String,

    pub description: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Raw capability strings, matched against capability ids and aliases
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub specializations: Vec<String>,

    #[serde(default)]
    pub use_cases: Vec<String>,

    /// Whether the agent can carry out state-changing operations
    /// (transfers, deployments, mints) rather than only advise.
    #[serde(default)]
    pub can_execute: bool,
}

/// What an agent returns from `execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub result: serde_json::Value,

    /// Confidence in the result (0.0 - 1.0)
    pub confidence: f32,
}

impl ExecutionOutcome {
    pub fn new(result: serde_json::Value, confidence: f32) -> Self {
        Self {
            result,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// An agent's own estimate of what a task will cost it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfAssessment {
    /// Relative cost (0.0 - 1.0)
    pub estimated_cost: f32,

    pub estimated_time_sec: f32,

    #[serde(default)]
    pub reasoning: String,
}

impl SelfAssessment {
    pub fn new(estimated_cost: f32, estimated_time_sec: f32, reasoning: impl Into<String>) -> Self {
        Self {
            estimated_cost: estimated_cost.clamp(0.0, 1.0),
            estimated_time_sec: estimated_time_sec.max(0.0),
            reasoning: reasoning.into(),
        }
    }
}

/// The interface every concrete agent implements.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn capabilities(&self) -> &[String] {
        &self.descriptor().capabilities
    }

    fn specializations(&self) -> &[String] {
        &self.descriptor().specializations
    }

    /// Perform the task.
    async fn execute(&self, requirement: &TaskRequirement) -> Result<ExecutionOutcome>;

    /// Estimate cost and time for a task before bidding on it.
    ///
    /// `Ok(None)` means the agent does not self-report; the negotiation
    /// falls back to an estimate derived from its metrics.
    async fn assess(&self, _requirement: &TaskRequirement) -> Result<Option<SelfAssessment>> {
        Ok(None)
    }
}
