//! Multi-round bidding and peer consultation.
//!
//! ```text
//!   candidates (scorer)
//!         │
//!         ▼
//!   ┌───────────────┐   round 2+   ┌───────────────┐
//!   │ bids (top 5)  │ ───────────► │ consultations │
//!   │  concurrent   │              │ (top 3 pairs) │
//!   └───────┬───────┘              └───────┬───────┘
//!           └──────────────┬───────────────┘
//!                          ▼
//!                    evaluate_bids ── > threshold ──► CONVERGED
//!                          │
//!                    rounds exhausted ──► highest confidence ──► EXHAUSTED
//! ```

use agora_common::{Agent, AgoraError, Result, SelfAssessment, TaskRequirement, new_task_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{AgentProfile, CapabilityCatalog};
use crate::config::{MAX_ROUNDS, NegotiationConfig};
use crate::context::RouterContext;
use crate::routing::CandidateMatch;
use crate::scorer::CapabilityScorer;

const BASE_BID_CONFIDENCE: f32 = 0.6;
const CONFIDENCE_PER_OVERLAP: f32 = 0.1;
pub const MAX_BID_CONFIDENCE: f32 = 0.95;

const SHARED_CONSULTATION_CONFIDENCE: f32 = 0.8;
const GENERAL_CONSULTATION_CONFIDENCE: f32 = 0.5;
pub const GENERAL_COLLABORATION: &str = "General collaboration";

/// Bids estimating this long or longer get no time credit.
const TIME_HORIZON_SEC: f32 = 120.0;
/// Matching specializations beyond this count add nothing.
const SPECIALIZATION_SATURATION: f32 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub agent_id: String,

    /// Confidence (0.0 - 0.95)
    pub confidence: f32,

    /// Relative cost (0.0 - 1.0)
    pub estimated_cost: f32,

    pub estimated_time_sec: f32,

    /// The agent's capabilities that overlap the requirement
    pub specializations: Vec<String>,

    pub reasoning: String,

    /// Whether cost and time came from the agent itself
    #[serde(default)]
    pub self_reported: bool,
}

impl Bid {
    /// Weighted score used to pick a winner:
    /// 0.4 confidence + 0.2 cheapness + 0.2 speed + 0.2 specialization.
    pub fn total_score(&self) -> f32 {
        0.4 * self.confidence
            + 0.2 * (1.0 - self.estimated_cost)
            + 0.2 * (1.0 - self.estimated_time_sec / TIME_HORIZON_SEC).max(0.0)
            + 0.2 * (self.specializations.len() as f32 / SPECIALIZATION_SATURATION).min(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub consulting_agent: String,
    pub consulted_agent: String,
    pub shared_expertise: String,
    pub recommendation: String,
    /// 0.8 when the pair shares a capability, 0.5 otherwise
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationRound {
    pub round: u8,
    pub bids: Vec<Bid>,
    pub consultations: Vec<Consultation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationState {
    /// Accepting rounds
    Open,
    /// A bid cleared the acceptance threshold
    Converged,
    /// Rounds ran out; the most confident bidder was taken
    Exhausted,
}

/// One delegation attempt, from candidates to the selected agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub task_id: String,
    pub requesting_agent: String,
    pub candidates: Vec<CandidateMatch>,
    pub rounds: Vec<NegotiationRound>,
    pub selected_agent: Option<String>,
    pub state: NegotiationState,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

/// Index of the highest-scoring bid above `threshold`. Ties keep the
/// earlier bid.
pub fn evaluate_bids(bids: &[Bid], threshold: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, bid) in bids.iter().enumerate() {
        let score = bid.total_score();
        if score <= threshold {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Exchange between two candidate agents about the task at hand.
pub fn consult(
    consulting: &AgentProfile,
    consulted: &AgentProfile,
    category: &str,
) -> Consultation {
    let shared: Vec<&str> = consulting
        .capabilities
        .iter()
        .filter(|c| consulted.capabilities.contains(c))
        .map(String::as_str)
        .collect();

    if shared.is_empty() {
        Consultation {
            consulting_agent: consulting.id.clone(),
            consulted_agent: consulted.id.clone(),
            shared_expertise: GENERAL_COLLABORATION.to_string(),
            recommendation: format!(
                "{} can give {} general context on {}",
                consulting.id, consulted.id, category
            ),
            confidence: GENERAL_CONSULTATION_CONFIDENCE,
        }
    } else {
        Consultation {
            consulting_agent: consulting.id.clone(),
            consulted_agent: consulted.id.clone(),
            shared_expertise: shared.join(", "),
            recommendation: format!(
                "{} and {} should coordinate on {} using shared {}",
                consulting.id,
                consulted.id,
                category,
                shared.join(", ")
            ),
            confidence: SHARED_CONSULTATION_CONFIDENCE,
        }
    }
}

/// Lowercased names a requirement accepts. Required capabilities are taken
/// as given; with none listed, the category is widened to the ids and
/// aliases of matching catalog entries and any synonym target.
fn accepted_terms(catalog: &CapabilityCatalog, requirement: &TaskRequirement) -> HashSet<String> {
    if !requirement.required_capabilities.is_empty() {
        return requirement
            .required_capabilities
            .iter()
            .map(|c| c.to_lowercase())
            .collect();
    }

    let category = &requirement.category;
    let mut terms = HashSet::new();
    terms.insert(category.to_lowercase());
    if let Some(alias) = catalog.synonym(category) {
        terms.insert(alias.to_lowercase());
    }
    for cap in catalog.capabilities().iter().filter(|c| c.answers_to(category)) {
        terms.insert(cap.id.to_lowercase());
        terms.extend(cap.aliases.iter().map(|a| a.to_lowercase()));
    }
    terms
}

/// Cost and time stand-in for agents that do not self-report, derived from
/// load: cost in [0.3, 0.7], time in [30, 90] seconds.
fn placeholder_estimate(load_score: f32) -> SelfAssessment {
    let load = load_score.clamp(0.0, 1.0);
    SelfAssessment::new(
        0.3 + 0.4 * load,
        30.0 + 60.0 * load,
        format!("estimated from load {load:.2}"),
    )
}

async fn request_bid(
    agent_id: String,
    agent: Option<Arc<dyn Agent>>,
    capabilities: Vec<String>,
    load_score: f32,
    requirement: TaskRequirement,
    accepted: Arc<HashSet<String>>,
) -> Bid {
    let mut specializations: Vec<String> = Vec::new();
    for cap in capabilities {
        if accepted.contains(&cap.to_lowercase()) && !specializations.contains(&cap) {
            specializations.push(cap);
        }
    }
    let confidence = (BASE_BID_CONFIDENCE + CONFIDENCE_PER_OVERLAP * specializations.len() as f32)
        .min(MAX_BID_CONFIDENCE);

    let (estimate, self_reported) = match agent {
        Some(agent) => match agent.assess(&requirement).await {
            Ok(Some(estimate)) => (estimate, true),
            Ok(None) => (placeholder_estimate(load_score), false),
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Self-assessment failed, using estimate");
                (placeholder_estimate(load_score), false)
            }
        },
        None => (placeholder_estimate(load_score), false),
    };

    let mut reasoning = format!(
        "{} matching capabilities; {}",
        specializations.len(),
        estimate.reasoning
    );
    if let Some(max_ms) = requirement.max_latency_ms {
        if estimate.estimated_time_sec * 1000.0 > max_ms as f32 {
            reasoning.push_str(&format!("; exceeds advisory latency of {max_ms} ms"));
        }
    }

    Bid {
        agent_id,
        confidence,
        estimated_cost: estimate.estimated_cost,
        estimated_time_sec: estimate.estimated_time_sec,
        specializations,
        reasoning,
        self_reported,
    }
}

/// Runs bounded negotiations over scored candidates.
#[derive(Debug, Clone)]
pub struct NegotiationCoordinator {
    config: NegotiationConfig,
    scorer: CapabilityScorer,
}

impl NegotiationCoordinator {
    pub fn new(config: NegotiationConfig, scorer: CapabilityScorer) -> Self {
        Self { config, scorer }
    }

    /// Negotiate which agent takes `requirement` on behalf of
    /// `requesting_agent`. Fails only when no agent is a candidate.
    pub async fn delegate_task(
        &self,
        ctx: &RouterContext,
        requesting_agent: &str,
        requirement: &TaskRequirement,
    ) -> Result<Negotiation> {
        let task_id = requirement
            .task_id()
            .map(str::to_string)
            .unwrap_or_else(new_task_id);

        let (candidates, accepted) = {
            let catalog = ctx.catalog.read().await;
            (
                self.scorer.find_best_agents_for_task(&catalog, requirement),
                Arc::new(accepted_terms(&catalog, requirement)),
            )
        };

        if candidates.is_empty() {
            warn!(
                task_id = %task_id,
                category = %requirement.category,
                required = ?requirement.required_capabilities,
                "No candidate agents"
            );
            return Err(AgoraError::NoCandidate(format!(
                "no agent offers {}",
                if requirement.required_capabilities.is_empty() {
                    requirement.category.clone()
                } else {
                    requirement
                        .required_capabilities
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            )));
        }

        info!(
            task_id = %task_id,
            requesting_agent = %requesting_agent,
            candidates = candidates.len(),
            "Starting negotiation"
        );

        let mut negotiation = Negotiation {
            task_id,
            requesting_agent: requesting_agent.to_string(),
            candidates,
            rounds: Vec::new(),
            selected_agent: None,
            state: NegotiationState::Open,
            reasoning: String::new(),
            created_at: Utc::now(),
        };

        let max_rounds = self.config.max_rounds.clamp(1, MAX_ROUNDS);
        for round in 1..=max_rounds {
            let bids = self
                .collect_bids(ctx, &negotiation.candidates, requirement, &accepted, round)
                .await;
            let consultations = if round >= 2 {
                self.consult_top_bidders(ctx, &bids, &requirement.category).await
            } else {
                Vec::new()
            };
            let winner = evaluate_bids(&bids, self.config.acceptance_threshold)
                .map(|i| (bids[i].agent_id.clone(), bids[i].total_score()));

            debug!(
                task_id = %negotiation.task_id,
                round,
                bids = bids.len(),
                consultations = consultations.len(),
                winner = ?winner,
                "Negotiation round complete"
            );

            negotiation.rounds.push(NegotiationRound {
                round,
                bids,
                consultations,
            });

            if let Some((agent_id, score)) = winner {
                negotiation.reasoning = format!(
                    "{agent_id} won round {round} with bid score {score:.3} (threshold {:.2})",
                    self.config.acceptance_threshold
                );
                negotiation.selected_agent = Some(agent_id);
                negotiation.state = NegotiationState::Converged;
                break;
            }
        }

        if negotiation.state == NegotiationState::Open {
            self.exhaust(&mut negotiation);
        }

        info!(
            task_id = %negotiation.task_id,
            state = ?negotiation.state,
            selected = ?negotiation.selected_agent,
            rounds = negotiation.rounds.len(),
            "Negotiation finished"
        );

        ctx.negotiations.write().await.insert(negotiation.clone());
        Ok(negotiation)
    }

    /// Fall back to the most confident bid of the last round, or the top
    /// candidate if that round produced no bids.
    fn exhaust(&self, negotiation: &mut Negotiation) {
        let last_bids = negotiation
            .rounds
            .last()
            .map(|r| r.bids.as_slice())
            .unwrap_or_default();

        let mut best: Option<&Bid> = None;
        for bid in last_bids {
            match best {
                Some(b) if bid.confidence <= b.confidence => {}
                _ => best = Some(bid),
            }
        }

        let (agent_id, reasoning) = match best {
            Some(bid) => (
                bid.agent_id.clone(),
                format!(
                    "No bid cleared {:.2} in {} round(s); {} had the highest confidence ({:.2})",
                    self.config.acceptance_threshold,
                    negotiation.rounds.len(),
                    bid.agent_id,
                    bid.confidence
                ),
            ),
            None => {
                let top = &negotiation.candidates[0];
                (
                    top.agent_id.clone(),
                    format!("No bids received; {} was the top candidate", top.agent_id),
                )
            }
        };

        negotiation.selected_agent = Some(agent_id);
        negotiation.reasoning = reasoning;
        negotiation.state = NegotiationState::Exhausted;
    }

    /// Ask the top candidates to bid, concurrently, and wait for all of them.
    async fn collect_bids(
        &self,
        ctx: &RouterContext,
        candidates: &[CandidateMatch],
        requirement: &TaskRequirement,
        accepted: &Arc<HashSet<String>>,
        round: u8,
    ) -> Vec<Bid> {
        let pool: Vec<&CandidateMatch> = candidates.iter().take(self.config.bid_pool).collect();

        let profiles: Vec<(String, Vec<String>, f32)> = {
            let catalog = ctx.catalog.read().await;
            pool.iter()
                .filter_map(|c| catalog.agent(&c.agent_id))
                .map(|p| (p.id.clone(), p.capabilities.clone(), p.metrics.load_score))
                .collect()
        };
        let agents: Vec<Option<Arc<dyn Agent>>> = {
            let registry = ctx.registry.read().await;
            profiles.iter().map(|(id, _, _)| registry.get(id)).collect()
        };

        let bid_requirement = requirement
            .clone()
            .with_context("negotiation_round", round.to_string());

        let mut handles = Vec::new();
        for ((agent_id, capabilities, load), agent) in profiles.into_iter().zip(agents) {
            let handle = tokio::spawn(request_bid(
                agent_id.clone(),
                agent,
                capabilities,
                load,
                bid_requirement.clone(),
                Arc::clone(accepted),
            ));
            handles.push((agent_id, handle));
        }

        let mut bids = Vec::with_capacity(handles.len());
        for (agent_id, handle) in handles {
            match handle.await {
                Ok(bid) => bids.push(bid),
                Err(e) => warn!(agent_id = %agent_id, error = %e, "Bid task failed"),
            }
        }
        bids
    }

    /// Every ordered pair among the most confident bidders consults.
    async fn consult_top_bidders(
        &self,
        ctx: &RouterContext,
        bids: &[Bid],
        category: &str,
    ) -> Vec<Consultation> {
        let mut ranked: Vec<&Bid> = bids.iter().collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(self.config.consultation_pool);

        let catalog = ctx.catalog.read().await;
        let profiles: Vec<&AgentProfile> = ranked
            .iter()
            .filter_map(|b| catalog.agent(&b.agent_id))
            .collect();

        let mut consultations = Vec::new();
        for (i, consulting) in profiles.iter().enumerate() {
            for (j, consulted) in profiles.iter().enumerate() {
                if i != j {
                    consultations.push(consult(consulting, consulted, category));
                }
            }
        }
        consultations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(agent_id: &str, confidence: f32, cost: f32, time: f32, specs: usize) -> Bid {
        Bid {
            agent_id: agent_id.into(),
            confidence,
            estimated_cost: cost,
            estimated_time_sec: time,
            specializations: (0..specs).map(|i| format!("s{i}")).collect(),
            reasoning: String::new(),
            self_reported: false,
        }
    }

    fn profile(id: &str, caps: &[&str]) -> AgentProfile {
        let mut catalog = CapabilityCatalog::new();
        catalog.register_agent(id, caps.iter().map(|c| c.to_string()).collect(), vec![]);
        catalog.agent(id).unwrap().clone()
    }

    #[test]
    fn test_evaluate_bids_prefers_stronger_bid() {
        let bids = vec![bid("bid1", 0.9, 0.3, 40.0, 3), bid("bid2", 0.65, 0.5, 90.0, 1)];

        assert!(bids[0].total_score() > 0.6);
        assert!(bids[0].total_score() > bids[1].total_score());
        assert_eq!(evaluate_bids(&bids, 0.6), Some(0));
    }

    #[test]
    fn test_total_score_formula() {
        let b = bid("a", 0.9, 0.3, 40.0, 3);
        let expected = 0.4 * 0.9 + 0.2 * 0.7 + 0.2 * (1.0 - 40.0 / 120.0) + 0.2 * 0.6;
        assert!((b.total_score() - expected).abs() < 1e-6);

        // Time past the horizon and extra specializations are capped.
        let slow = bid("b", 0.9, 0.3, 500.0, 9);
        let expected = 0.4 * 0.9 + 0.2 * 0.7 + 0.0 + 0.2;
        assert!((slow.total_score() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_evaluate_bids_ties_keep_first() {
        let bids = vec![bid("first", 0.9, 0.1, 10.0, 5), bid("second", 0.9, 0.1, 10.0, 5)];
        assert_eq!(evaluate_bids(&bids, 0.6), Some(0));
    }

    #[test]
    fn test_evaluate_bids_threshold_is_strict() {
        let bids = vec![bid("weak", 0.6, 0.9, 110.0, 0)];
        assert!(bids[0].total_score() <= 0.6);
        assert_eq!(evaluate_bids(&bids, 0.6), None);
        assert_eq!(evaluate_bids(&[], 0.6), None);
    }

    #[test]
    fn test_consultation_shared_capability() {
        let a = profile("a", &["blockchain_operations", "token_transfer"]);
        let b = profile("b", &["blockchain_operations", "market_analysis"]);
        let c = consult(&a, &b, "token_transfer");

        assert_eq!(c.confidence, 0.8);
        assert_eq!(c.shared_expertise, "blockchain_operations");
        assert_ne!(c.shared_expertise, GENERAL_COLLABORATION);
        assert_eq!(c.consulting_agent, "a");
        assert_eq!(c.consulted_agent, "b");
    }

    #[test]
    fn test_consultation_nothing_shared() {
        let a = profile("a", &["companion_chat"]);
        let b = profile("b", &["market_analysis"]);
        let c = consult(&a, &b, "chat");

        assert_eq!(c.confidence, 0.5);
        assert_eq!(c.shared_expertise, "General collaboration");
    }

    #[test]
    fn test_placeholder_estimate_bounds() {
        let idle = placeholder_estimate(0.0);
        let busy = placeholder_estimate(1.0);
        assert!((idle.estimated_cost - 0.3).abs() < 1e-6);
        assert!((idle.estimated_time_sec - 30.0).abs() < 1e-6);
        assert!((busy.estimated_cost - 0.7).abs() < 1e-6);
        assert!((busy.estimated_time_sec - 90.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_bid_confidence_is_capped() {
        let accepted: HashSet<String> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let caps = accepted.iter().cloned().collect();
        let bid = request_bid(
            "x".into(),
            None,
            caps,
            0.0,
            TaskRequirement::new("a"),
            Arc::new(accepted),
        )
        .await;
        assert_eq!(bid.confidence, MAX_BID_CONFIDENCE);
        assert_eq!(bid.specializations.len(), 6);
        assert!(!bid.self_reported);
    }

    #[tokio::test]
    async fn test_bid_notes_advisory_latency() {
        let bid = request_bid(
            "x".into(),
            None,
            vec![],
            1.0,
            TaskRequirement::new("a").with_max_latency_ms(1_000),
            Arc::new(HashSet::new()),
        )
        .await;
        assert_eq!(bid.confidence, 0.6);
        assert!(bid.reasoning.contains("exceeds advisory latency of 1000 ms"));
    }
}
