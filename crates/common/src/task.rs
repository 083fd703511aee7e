//! Task requirement types consumed by routing and negotiation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// How sensitive the task is (funds, keys, personal data).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// What a caller needs done, independent of who does it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequirement {
    /// Task category, usually a capability id or alias (e.g. `erc20_deployment`)
    pub category: String,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Advisory latency budget. Never enforced as a deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,

    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,

    /// Free-text description of the task
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl TaskRequirement {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    pub fn require(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.insert(capability.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Explicit task id from the context, if the caller supplied one.
    pub fn task_id(&self) -> Option<&str> {
        self.context.get("task_id").map(String::as_str)
    }

    /// Copy of this requirement re-targeted at a consulting agent.
    pub fn consultation(&self) -> Self {
        let mut derived = self.clone();
        derived.category = format!("consult_on_{}", self.category);
        derived
            .context
            .insert("consultation_for".into(), self.category.clone());
        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_builder_methods() {
        let req = TaskRequirement::new("erc20_deployment")
            .with_description("Deploy a token on sepolia")
            .with_priority(TaskPriority::High)
            .with_security_level(SecurityLevel::High)
            .with_max_latency_ms(5_000)
            .require("blockchain_operations")
            .with_context("task_id", "task_1");

        assert_eq!(req.category, "erc20_deployment");
        assert_eq!(req.priority, TaskPriority::High);
        assert_eq!(req.security_level, SecurityLevel::High);
        assert_eq!(req.max_latency_ms, Some(5_000));
        assert!(req.required_capabilities.contains("blockchain_operations"));
        assert_eq!(req.task_id(), Some("task_1"));
    }

    #[test]
    fn test_priority_ordering_and_default() {
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(SecurityLevel::default(), SecurityLevel::Low);
    }

    #[test]
    fn test_consultation_tags_category() {
        let req = TaskRequirement::new("nft_minting").with_description("Mint a collection");
        let consult = req.consultation();
        assert_eq!(consult.category, "consult_on_nft_minting");
        assert_eq!(
            consult.context.get("consultation_for").map(String::as_str),
            Some("nft_minting")
        );
        assert_eq!(consult.description, req.description);
    }

    #[test]
    fn test_requirement_deserializes_with_defaults() {
        let json = r#"{"category": "research", "required_capabilities": ["research_analysis"]}"#;
        let req: TaskRequirement = serde_json::from_str(json).unwrap();
        assert_eq!(req.priority, TaskPriority::Medium);
        assert_eq!(req.security_level, SecurityLevel::Low);
        assert!(req.max_latency_ms.is_none());
        assert!(req.context.is_empty());
        assert_eq!(req.required_capabilities.len(), 1);
    }

    #[test]
    fn test_priority_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TaskPriority::High).unwrap(), "\"high\"");
        let level: SecurityLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(level, SecurityLevel::Medium);
    }
}
