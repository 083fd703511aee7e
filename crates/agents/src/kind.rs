//! Agent kinds selectable from configuration.

use std::fmt;
use std::sync::Arc;

use agora_common::{Agent, AgentDescriptor};
use agora_llm::LlmClient;
use serde::{Deserialize, Serialize};

use crate::{
    BlockchainAgent, CodeGenAgent, CompanionAgent, OrchestratorAgent, ResearchAgent, blockchain,
    codegen, companion, orchestrator, research,
};

/// The built-in agent implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Blockchain,
    Research,
    CodeGeneration,
    Companion,
    Orchestration,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Blockchain,
        AgentKind::Research,
        AgentKind::CodeGeneration,
        AgentKind::Companion,
        AgentKind::Orchestration,
    ];

    /// Id used by the bootstrap catalog for this kind.
    pub fn default_id(self) -> &'static str {
        match self {
            AgentKind::Blockchain => "blockchain-agent",
            AgentKind::Research => "research-agent",
            AgentKind::CodeGeneration => "code-agent",
            AgentKind::Companion => "companion-agent",
            AgentKind::Orchestration => "orchestrator-agent",
        }
    }

    /// Built-in profile for this kind under the given id.
    pub fn default_descriptor(self, id: impl Into<String>) -> AgentDescriptor {
        match self {
            AgentKind::Blockchain => blockchain::default_descriptor(id),
            AgentKind::Research => research::default_descriptor(id),
            AgentKind::CodeGeneration => codegen::default_descriptor(id),
            AgentKind::Companion => companion::default_descriptor(id),
            AgentKind::Orchestration => orchestrator::default_descriptor(id),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentKind::Blockchain => "blockchain",
            AgentKind::Research => "research",
            AgentKind::CodeGeneration => "code_generation",
            AgentKind::Companion => "companion",
            AgentKind::Orchestration => "orchestration",
        };
        write!(f, "{s}")
    }
}

/// Construct an agent of `kind` with the given profile.
pub fn build_agent(
    kind: AgentKind,
    descriptor: AgentDescriptor,
    llm: Option<Arc<dyn LlmClient>>,
) -> Arc<dyn Agent> {
    match kind {
        AgentKind::Blockchain => Arc::new(BlockchainAgent::new(descriptor, llm)),
        AgentKind::Research => Arc::new(ResearchAgent::new(descriptor, llm)),
        AgentKind::CodeGeneration => Arc::new(CodeGenAgent::new(descriptor, llm)),
        AgentKind::Companion => Arc::new(CompanionAgent::new(descriptor, llm)),
        AgentKind::Orchestration => Arc::new(OrchestratorAgent::new(descriptor, llm)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_deserializes_snake_case() {
        let kind: AgentKind = serde_json::from_str("\"code_generation\"").unwrap();
        assert_eq!(kind, AgentKind::CodeGeneration);
        assert_eq!(kind.to_string(), "code_generation");
    }

    #[test]
    fn build_agent_keeps_descriptor_id() {
        for kind in AgentKind::ALL {
            let agent = build_agent(kind, kind.default_descriptor("custom"), None);
            assert_eq!(agent.id(), "custom");
            assert!(!agent.capabilities().is_empty());
        }
    }

    #[test]
    fn only_blockchain_executes() {
        for kind in AgentKind::ALL {
            let d = kind.default_descriptor(kind.default_id());
            assert_eq!(d.can_execute, kind == AgentKind::Blockchain);
        }
    }
}
