//! Bounded in-memory history of negotiations and collaborations.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::negotiation::Negotiation;
use crate::synthesis::CollaborativeResult;

/// Negotiations keyed by task id, evicting the oldest task past capacity.
#[derive(Debug)]
pub struct NegotiationLog {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Negotiation>,
}

impl NegotiationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Store a negotiation. A task id seen before is replaced and counts as
    /// the newest entry.
    pub fn insert(&mut self, negotiation: Negotiation) {
        let task_id = negotiation.task_id.clone();
        if self.entries.insert(task_id.clone(), negotiation).is_some() {
            self.order.retain(|id| id != &task_id);
        }
        self.order.push_back(task_id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
                debug!(task_id = %evicted, "Evicted negotiation from history");
            }
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&Negotiation> {
        self.entries.get(task_id)
    }

    /// Newest first.
    pub fn recent(&self) -> impl Iterator<Item = &Negotiation> {
        self.order.iter().rev().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Per-agent ring buffer of collaborative results.
#[derive(Debug)]
pub struct CollaborationLog {
    per_agent: usize,
    entries: HashMap<String, VecDeque<CollaborativeResult>>,
}

impl CollaborationLog {
    pub fn new(per_agent: usize) -> Self {
        Self {
            per_agent: per_agent.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, agent_id: &str, result: CollaborativeResult) {
        let log = self.entries.entry(agent_id.to_string()).or_default();
        log.push_back(result);
        while log.len() > self.per_agent {
            log.pop_front();
        }
    }

    /// Oldest first.
    pub fn history(&self, agent_id: &str) -> Vec<CollaborativeResult> {
        self.entries
            .get(agent_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::NegotiationState;
    use chrono::Utc;

    fn negotiation(task_id: &str) -> Negotiation {
        Negotiation {
            task_id: task_id.into(),
            requesting_agent: "tester".into(),
            candidates: vec![],
            rounds: vec![],
            selected_agent: None,
            state: NegotiationState::Open,
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    fn collaboration(primary: &str, confidence: f32) -> CollaborativeResult {
        CollaborativeResult {
            task_id: "t".into(),
            primary_agent: primary.into(),
            consulting_agents: vec![],
            failed_consultants: vec![],
            synthesized_result: serde_json::Value::Null,
            contributions: Default::default(),
            confidence,
            collaboration_confidence: confidence,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_negotiation_log_evicts_oldest() {
        let mut log = NegotiationLog::new(2);
        log.insert(negotiation("t1"));
        log.insert(negotiation("t2"));
        log.insert(negotiation("t3"));

        assert_eq!(log.len(), 2);
        assert!(log.get("t1").is_none());
        let recent: Vec<_> = log.recent().map(|n| n.task_id.as_str()).collect();
        assert_eq!(recent, vec!["t3", "t2"]);
    }

    #[test]
    fn test_negotiation_log_replaces_same_task() {
        let mut log = NegotiationLog::new(2);
        log.insert(negotiation("t1"));
        log.insert(negotiation("t2"));
        let mut again = negotiation("t1");
        again.reasoning = "second".into();
        log.insert(again);
        log.insert(negotiation("t3"));

        assert_eq!(log.len(), 2);
        assert!(log.get("t2").is_none());
        assert_eq!(log.get("t1").unwrap().reasoning, "second");
    }

    #[test]
    fn test_collaboration_log_ring_buffer() {
        let mut log = CollaborationLog::new(2);
        for i in 0..3 {
            log.record("a", collaboration("a", i as f32 / 10.0));
        }
        let history = log.history("a");
        assert_eq!(history.len(), 2);
        assert!((history[0].confidence - 0.1).abs() < 1e-6);
        assert!(log.history("b").is_empty());
    }
}
