//! Rule-based capability scoring.
//!
//! Three passes over the catalog, each with its own base score:
//!
//! | Pass     | Trigger                                   | Raw score |
//! |----------|-------------------------------------------|-----------|
//! | exact    | category is a capability alias            | 10        |
//! | semantic | category resolves through the synonym map | 8         |
//! | partial  | agent capabilities overlap the category   | 3 + ...   |
//!
//! Raw scores are divided by 10 and clamped to [0, 1].

use agora_common::TaskRequirement;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::catalog::{AgentProfile, CapabilityCatalog};
use crate::routing::{CandidateMatch, MatchType};

const EXACT_SCORE: f32 = 10.0;
const SEMANTIC_SCORE: f32 = 8.0;
const PARTIAL_BASE: f32 = 3.0;
const PARTIAL_PER_OVERLAP: f32 = 0.5;
const SPECIALIZATION_BONUS: f32 = 2.0;
const LOAD_PENALTY: f32 = 0.1;
const SUCCESS_BONUS: f32 = 1.0;
const SCORE_SCALE: f32 = 10.0;

/// Terms treated as related during partial matching. A capability and a
/// category are related when both have a word starting with a term from the
/// same cluster. Words are split on `_`, `-` and whitespace.
const RELATED_TERMS: [&[&str]; 6] = [
    &["blockchain", "token", "wallet", "transfer", "chain"],
    &["nft", "erc", "mint", "collectible"],
    &["defi", "yield", "swap", "liquidity", "stake", "staking"],
    &["contract", "deploy", "solidity"],
    &["companion", "chat", "conversation", "emotional"],
    &["task", "orchestrat", "workflow", "plan"],
];

fn clusters_of(term: &str) -> impl Iterator<Item = usize> + '_ {
    RELATED_TERMS
        .iter()
        .enumerate()
        .filter(move |(_, prefixes)| {
            term.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
                .any(|word| prefixes.iter().any(|p| word.starts_with(p)))
        })
        .map(|(i, _)| i)
}

fn related(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    clusters_of(a).any(|i| clusters_of(b).any(|j| i == j))
}

/// Scores agents against a requirement using the catalog.
#[derive(Debug, Clone)]
pub struct CapabilityScorer {
    min_candidate_score: f32,
}

impl Default for CapabilityScorer {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl CapabilityScorer {
    pub fn new(min_candidate_score: f32) -> Self {
        Self { min_candidate_score }
    }

    pub fn min_candidate_score(&self) -> f32 {
        self.min_candidate_score
    }

    /// Rank every agent that matches `requirement.category`, best first.
    /// Each agent appears at most once, with its best match.
    pub fn find_best_agent(
        &self,
        catalog: &CapabilityCatalog,
        requirement: &TaskRequirement,
    ) -> Vec<CandidateMatch> {
        let category = requirement.category.to_lowercase();
        let mut matches = Vec::new();

        for cap in catalog.capabilities_with_alias(&category) {
            for agent in &cap.agents {
                matches.push(CandidateMatch::new(
                    agent.clone(),
                    EXACT_SCORE / SCORE_SCALE,
                    MatchType::Exact,
                    format!("Exact match on capability '{}'", cap.id),
                ));
            }
        }

        if let Some(alias) = catalog.synonym(&category) {
            for cap in catalog.capabilities_with_alias(alias) {
                for agent in &cap.agents {
                    matches.push(CandidateMatch::new(
                        agent.clone(),
                        SEMANTIC_SCORE / SCORE_SCALE,
                        MatchType::Semantic,
                        format!("'{}' is a synonym of '{}' ({})", category, alias, cap.id),
                    ));
                }
            }
        }

        for profile in catalog.registered_agents() {
            if let Some(candidate) = partial_match(profile, &category) {
                matches.push(candidate);
            }
        }

        let ranked = rank(catalog, matches);
        debug!(
            category = %requirement.category,
            candidates = ranked.len(),
            top = ?ranked.first().map(|m| (&m.agent_id, m.score)),
            "Scored candidates"
        );
        ranked
    }

    /// Candidates for a whole requirement: every required capability (or
    /// the category when none are listed) is scored, each agent keeps its
    /// best match, and anything at or below the minimum score is dropped.
    pub fn find_best_agents_for_task(
        &self,
        catalog: &CapabilityCatalog,
        requirement: &TaskRequirement,
    ) -> Vec<CandidateMatch> {
        let targets: Vec<String> = if requirement.required_capabilities.is_empty() {
            vec![requirement.category.clone()]
        } else {
            requirement.required_capabilities.iter().cloned().collect()
        };

        let mut all = Vec::new();
        for target in targets {
            let mut single = requirement.clone();
            single.category = target;
            all.extend(self.find_best_agent(catalog, &single));
        }

        let mut ranked = rank(catalog, all);
        ranked.retain(|m| m.score > self.min_candidate_score);
        ranked
    }
}

fn partial_match(profile: &AgentProfile, category: &str) -> Option<CandidateMatch> {
    let overlap: Vec<&String> = profile
        .capabilities
        .iter()
        .filter(|c| related(&c.to_lowercase(), category))
        .collect();
    if overlap.is_empty() {
        return None;
    }

    let specialization_hit = profile.specializations.iter().any(|s| {
        let s = s.to_lowercase();
        !s.is_empty() && (category.contains(&s) || s.contains(category))
    });

    let raw = PARTIAL_BASE + PARTIAL_PER_OVERLAP * overlap.len() as f32
        + if specialization_hit { SPECIALIZATION_BONUS } else { 0.0 }
        - LOAD_PENALTY * profile.metrics.load_score
        + SUCCESS_BONUS * profile.metrics.success_rate;

    Some(CandidateMatch::new(
        profile.id.clone(),
        raw.max(0.0) / SCORE_SCALE,
        MatchType::Partial,
        format!(
            "Partial match via {}{}",
            overlap
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            if specialization_hit {
                " (specialization)"
            } else {
                ""
            }
        ),
    ))
}

/// Keep each agent's best match, then sort by score with registration order
/// breaking ties.
fn rank(catalog: &CapabilityCatalog, matches: Vec<CandidateMatch>) -> Vec<CandidateMatch> {
    let mut best: Vec<CandidateMatch> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for m in matches {
        match seen.get(&m.agent_id) {
            Some(&i) if best[i].score >= m.score => {}
            Some(&i) => best[i] = m,
            None => {
                seen.insert(m.agent_id.clone(), best.len());
                best.push(m);
            }
        }
    }

    best.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let pa = catalog.position(&a.agent_id).unwrap_or(usize::MAX);
                let pb = catalog.position(&b.agent_id).unwrap_or(usize::MAX);
                pa.cmp(&pb)
            })
    });
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Capability;

    fn catalog() -> CapabilityCatalog {
        let mut catalog = CapabilityCatalog::new();
        catalog.register_capability(
            Capability::new("erc20_deployment", "Deploy ERC20 tokens")
                .with_aliases(&["erc20_deployment"])
                .with_agents(&["blockchain-agent"]),
        );
        catalog.register_agent(
            "blockchain-agent",
            vec!["blockchain_operations".into(), "erc20_deployment".into()],
            vec!["erc20".into()],
        );
        catalog.register_agent(
            "research-agent",
            vec!["research_analysis".into(), "market_analysis".into()],
            vec![],
        );
        catalog.register_agent("companion-agent", vec!["companion_chat".into()], vec![]);
        catalog
    }

    #[test]
    fn test_exact_match_single_agent() {
        let catalog = catalog();
        let matches = CapabilityScorer::default()
            .find_best_agent(&catalog, &TaskRequirement::new("erc20_deployment"));

        let exact: Vec<_> = matches
            .iter()
            .filter(|m| m.match_type == MatchType::Exact)
            .collect();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].agent_id, "blockchain-agent");
        assert_eq!(exact[0].score, 1.0);
    }

    #[test]
    fn test_exact_match_only_names_listed_agents() {
        let catalog = catalog();
        let scorer = CapabilityScorer::default();
        for cap in catalog.capabilities() {
            for alias in &cap.aliases {
                let matches =
                    scorer.find_best_agent(&catalog, &TaskRequirement::new(alias.as_str()));
                for m in matches.iter().filter(|m| m.match_type == MatchType::Exact) {
                    assert!(cap.agents.contains(&m.agent_id));
                }
            }
        }
    }

    #[test]
    fn test_semantic_match_through_synonym() {
        let mut catalog = catalog();
        catalog.register_synonym("launch token", "erc20_deployment");
        let matches = CapabilityScorer::default()
            .find_best_agent(&catalog, &TaskRequirement::new("launch_token"));

        assert_eq!(matches[0].agent_id, "blockchain-agent");
        assert_eq!(matches[0].match_type, MatchType::Semantic);
        assert!((matches[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_partial_score_formula() {
        let mut catalog = catalog();
        catalog.update_agent_metrics("research-agent", 0.5, 0.8).unwrap();
        let matches = CapabilityScorer::default()
            .find_best_agent(&catalog, &TaskRequirement::new("analysis"));

        let research = matches.iter().find(|m| m.agent_id == "research-agent").unwrap();
        assert_eq!(research.match_type, MatchType::Partial);
        // 3 + 0.5*2 - 0.1*0.5 + 1*0.8 = 4.75
        assert!((research.score - 0.475).abs() < 1e-5);
    }

    #[test]
    fn test_cluster_match_and_specialization() {
        let catalog = catalog();
        let matches =
            CapabilityScorer::default().find_best_agent(&catalog, &TaskRequirement::new("erc20"));

        let chain = matches.iter().find(|m| m.agent_id == "blockchain-agent").unwrap();
        // erc20_deployment contains "erc20" and blockchain_operations shares
        // no cluster with it: 3 + 0.5 + 2 + 1 = 6.5
        assert!((chain.score - 0.65).abs() < 1e-5);
        assert!(chain.reasoning.contains("specialization"));
    }

    #[test]
    fn test_clusters_match_whole_word_prefixes() {
        assert!(related("workflow_planning", "task_orchestration"));
        assert!(related("nft_minting", "erc721"));
        assert!(related("token_transfer", "send-tokens"));
        assert!(!related("workflow_planning", "explanation"));
        assert!(!related("nft_minting", "commerce"));
        assert!(!related("blockchain_query", "supply chainsaw"));
    }

    #[test]
    fn test_scores_bounded_and_sorted() {
        let mut catalog = catalog();
        catalog.update_agent_metrics("companion-agent", 1.0, 1.0).unwrap();
        let scorer = CapabilityScorer::default();
        for category in ["erc20_deployment", "chat", "token", "market", "nothing"] {
            let matches = scorer.find_best_agent(&catalog, &TaskRequirement::new(category));
            for pair in matches.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
            for m in &matches {
                assert!((0.0..=1.0).contains(&m.score));
            }
        }
    }

    #[test]
    fn test_ties_follow_registration_order() {
        let mut catalog = CapabilityCatalog::new();
        catalog.register_agent("b-agent", vec!["token_transfer".into()], vec![]);
        catalog.register_agent("a-agent", vec!["token_transfer".into()], vec![]);
        let matches = CapabilityScorer::default()
            .find_best_agent(&catalog, &TaskRequirement::new("token_transfer"));
        assert_eq!(matches[0].agent_id, "b-agent");
        assert_eq!(matches[1].agent_id, "a-agent");
    }

    #[test]
    fn test_no_candidates_for_unknown_capability() {
        let catalog = catalog();
        let req = TaskRequirement::new("anything").require("nonexistent_cap");
        assert!(CapabilityScorer::default()
            .find_best_agents_for_task(&catalog, &req)
            .is_empty());
    }

    #[test]
    fn test_best_agents_for_task_merges_required_capabilities() {
        let catalog = catalog();
        let req = TaskRequirement::new("launch")
            .require("erc20_deployment")
            .require("market_analysis");
        let matches = CapabilityScorer::default().find_best_agents_for_task(&catalog, &req);

        assert_eq!(matches[0].agent_id, "blockchain-agent");
        assert_eq!(matches[0].score, 1.0);
        assert!(matches.iter().any(|m| m.agent_id == "research-agent"));
        assert!(matches.iter().all(|m| m.score > 0.3));
        let ids: Vec<_> = matches.iter().map(|m| &m.agent_id).collect();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
    }
}
