//! Primary + consultant execution and result synthesis.

use agora_common::{Agent, AgoraError, ExecutionOutcome, Result, TaskRequirement, new_task_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::RouterContext;

/// Weight of the primary agent in the synthesis confidence.
const PRIMARY_WEIGHT: f32 = 0.7;
/// Stand-in consultation confidence when no consultant contributed.
const DEFAULT_CONSULTATION_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionRole {
    Primary,
    Consultant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub role: ContributionRole,
    pub result: serde_json::Value,
    pub confidence: f32,
}

/// Merged output of a primary agent and its consultants.
///
/// Carries two confidence figures that are deliberately not merged:
/// `confidence` weights the primary agent, `collaboration_confidence` is
/// the plain mean over every contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeResult {
    pub task_id: String,
    pub primary_agent: String,

    /// Consultants that contributed
    pub consulting_agents: Vec<String>,

    /// Consultants that failed or were unknown
    #[serde(default)]
    pub failed_consultants: Vec<String>,

    pub synthesized_result: serde_json::Value,

    pub contributions: BTreeMap<String, Contribution>,

    pub confidence: f32,
    pub collaboration_confidence: f32,
    pub completed_at: DateTime<Utc>,
}

/// `0.7 * primary + 0.3 * mean(consultations)`, with 0.5 standing in for
/// the mean when there are no consultations.
pub fn synthesis_confidence(primary: f32, consultations: &[f32]) -> f32 {
    let consult_mean = if consultations.is_empty() {
        DEFAULT_CONSULTATION_CONFIDENCE
    } else {
        consultations.iter().sum::<f32>() / consultations.len() as f32
    };
    (PRIMARY_WEIGHT * primary + (1.0 - PRIMARY_WEIGHT) * consult_mean).clamp(0.0, 1.0)
}

/// Arithmetic mean of every contribution's confidence.
pub fn collaboration_confidence(confidences: &[f32]) -> f32 {
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.iter().sum::<f32>() / confidences.len() as f32
}

#[derive(Debug, Clone, Default)]
pub struct CollaborationSynthesizer;

impl CollaborationSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Run the primary agent and every consultant, then merge their output.
    ///
    /// A primary failure fails the call. Consultant failures are logged and
    /// left out of the synthesis. Repeated consultant ids run once.
    pub async fn execute_collaborative_task(
        &self,
        ctx: &RouterContext,
        primary_agent: &str,
        consulting_agents: &[String],
        requirement: &TaskRequirement,
    ) -> Result<CollaborativeResult> {
        let task_id = requirement
            .task_id()
            .map(str::to_string)
            .unwrap_or_else(new_task_id);

        let (primary, consultants) = {
            let registry = ctx.registry.read().await;
            let primary = registry
                .get(primary_agent)
                .ok_or_else(|| AgoraError::UnknownAgent(primary_agent.to_string()))?;
            let mut seen = HashSet::new();
            let consultants: Vec<(String, Option<Arc<dyn Agent>>)> = consulting_agents
                .iter()
                .filter(|id| id.as_str() != primary_agent && seen.insert(id.as_str()))
                .map(|id| (id.clone(), registry.get(id)))
                .collect();
            (primary, consultants)
        };

        info!(
            task_id = %task_id,
            primary = %primary_agent,
            consultants = consultants.len(),
            "Starting collaborative task"
        );

        let consultation = requirement.consultation();
        let mut failed_consultants = Vec::new();
        let mut handles: Vec<(String, JoinHandle<Result<ExecutionOutcome>>)> = Vec::new();
        for (id, agent) in consultants {
            match agent {
                Some(agent) => {
                    let req = consultation.clone();
                    handles.push((id, tokio::spawn(async move { agent.execute(&req).await })));
                }
                None => {
                    warn!(agent_id = %id, "Unknown consulting agent, skipping");
                    failed_consultants.push(id);
                }
            }
        }

        let primary_outcome = match primary.execute(requirement).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(agent_id = %primary_agent, error = %e, "Primary agent failed");
                for (_, handle) in &handles {
                    handle.abort();
                }
                return Err(match e {
                    AgoraError::ExecutionFailed { .. } => e,
                    other => AgoraError::execution(primary_agent, other.to_string()),
                });
            }
        };

        let mut contributions = BTreeMap::new();
        let mut consulting = Vec::new();
        let mut consult_results = serde_json::Map::new();
        let mut consult_confidences = Vec::new();
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(agent_id = %id, error = %e, "Consulting agent failed");
                    failed_consultants.push(id);
                    continue;
                }
                Err(e) => {
                    warn!(agent_id = %id, error = %e, "Consulting task panicked");
                    failed_consultants.push(id);
                    continue;
                }
            };
            consult_confidences.push(outcome.confidence);
            consult_results.insert(id.clone(), outcome.result.clone());
            contributions.insert(
                id.clone(),
                Contribution {
                    role: ContributionRole::Consultant,
                    result: outcome.result,
                    confidence: outcome.confidence,
                },
            );
            consulting.push(id);
        }

        let confidence = synthesis_confidence(primary_outcome.confidence, &consult_confidences);
        let mut all_confidences = vec![primary_outcome.confidence];
        all_confidences.extend(&consult_confidences);
        let collaboration = collaboration_confidence(&all_confidences);

        let synthesized_result = serde_json::json!({
            "primary": primary_outcome.result.clone(),
            "consultations": consult_results,
        });
        contributions.insert(
            primary_agent.to_string(),
            Contribution {
                role: ContributionRole::Primary,
                result: primary_outcome.result,
                confidence: primary_outcome.confidence,
            },
        );

        let result = CollaborativeResult {
            task_id,
            primary_agent: primary_agent.to_string(),
            consulting_agents: consulting,
            failed_consultants,
            synthesized_result,
            contributions,
            confidence,
            collaboration_confidence: collaboration,
            completed_at: Utc::now(),
        };

        info!(
            task_id = %result.task_id,
            confidence = result.confidence,
            collaboration_confidence = result.collaboration_confidence,
            failed = result.failed_consultants.len(),
            "Collaborative task complete"
        );

        {
            let mut log = ctx.collaborations.write().await;
            log.record(primary_agent, result.clone());
            for id in &result.consulting_agents {
                log.record(id, result.clone());
            }
        }

        Ok(result)
    }

    /// Recent collaborations the agent took part in, oldest first.
    pub async fn history(&self, ctx: &RouterContext, agent_id: &str) -> Vec<CollaborativeResult> {
        ctx.collaborations.read().await.history(agent_id)
    }
}
