//! Routing and selection result types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a candidate was matched to a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Category is one of a capability's aliases
    Exact,
    /// Category resolved through the synonym table
    Semantic,
    /// Overlap between the agent's raw capabilities and the category
    Partial,
}

/// One agent considered for a task during scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub agent_id: String,

    /// Normalised score (0.0 - 1.0)
    pub score: f32,

    pub match_type: MatchType,

    pub reasoning: String,
}

impl CandidateMatch {
    pub fn new(
        agent_id: impl Into<String>,
        score: f32,
        match_type: MatchType,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            score: score.clamp(0.0, 1.0),
            match_type,
            reasoning: reasoning.into(),
        }
    }
}

/// Keyword bucket a task description falls into. Checked in declaration
/// order; the first bucket that matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDomain {
    Execution,
    BlockchainQuery,
    Analysis,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn estimated_duration_sec(self) -> u64 {
        match self {
            Complexity::Low => 30,
            Complexity::Medium => 120,
            Complexity::High => 300,
        }
    }
}

/// What the router understood about the task before choosing an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub category: String,
    pub domain: TaskDomain,
    pub complexity: Complexity,
    pub estimated_duration_sec: u64,
    pub required_capabilities: Vec<String>,
}

/// Which path produced the primary agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPath {
    Semantic,
    Traditional,
    Scorer,
    Default,
}

/// Final answer of a routing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub primary_agent: String,
    pub alternative_agents: Vec<String>,
    pub task_analysis: TaskAnalysis,
    pub reasoning: Vec<String>,

    /// Confidence in the primary agent (0.0 - 1.0)
    pub confidence: f32,

    /// True when an external service failed and a fallback was used
    pub degraded: bool,

    pub path: SelectionPath,

    /// Request context after tag extraction
    #[serde(default)]
    pub context: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_score_is_clamped() {
        assert_eq!(CandidateMatch::new("a", 1.7, MatchType::Exact, "").score, 1.0);
        assert_eq!(CandidateMatch::new("a", -0.2, MatchType::Partial, "").score, 0.0);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&MatchType::Semantic).unwrap(), "\"semantic\"");
        assert_eq!(
            serde_json::to_string(&TaskDomain::BlockchainQuery).unwrap(),
            "\"blockchain_query\""
        );
    }
}
