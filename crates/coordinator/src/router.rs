//! The task router: classification, agent selection and pass-through to
//! negotiation and collaboration.

use agora_agents::build_agent;
use agora_common::{Agent, AgoraError, Result, TaskPriority, TaskRequirement};
use agora_llm::{EmbeddingClient, LlmClient, build_embedding_client, build_llm_client};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{AgentProfile, CapabilityCatalog};
use crate::config::RouterConfig;
use crate::context::RouterContext;
use crate::negotiation::{Negotiation, NegotiationCoordinator};
use crate::routing::{Complexity, SelectionPath, SelectionResult, TaskAnalysis, TaskDomain};
use crate::scorer::CapabilityScorer;
use crate::semantic::{SemanticMatcher, SemanticRequest};
use crate::synthesis::{CollaborationSynthesizer, CollaborativeResult};
use crate::traditional::TraditionalSelector;

/// Alternatives listed next to the primary agent.
const MAX_ALTERNATIVES: usize = 3;

/// Confidence reported when nothing but the default agent is left.
const DEFAULT_AGENT_CONFIDENCE: f32 = 0.3;

const EXECUTION_KEYWORDS: &[&str] = &[
    "transfer", "send ", "deploy", "mint", "execute", "swap", "stake", "bridge", "airdrop",
    "launch a token", "create a token", "create token",
];

const QUERY_KEYWORDS: &[&str] = &[
    "balance", "transaction", "tx hash", "gas price", "gas fee", "block number", "holdings",
    "on-chain", "onchain", "wallet address", "contract address",
];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "analy", "research", "compare", "report", "trend", "market", "price", "explain", "what is",
    "how does", "why ",
];

const CODE_KEYWORDS: &[&str] = &[
    "code", "contract", "solidity", "function", "script", "implement", "refactor", "debug",
];

const PLANNING_KEYWORDS: &[&str] = &["plan", "workflow", "steps", "orchestrat", "coordinate"];

const MULTI_STEP_MARKERS: &[&str] = &[" and then ", " then ", "after that", "followed by", "; "];

/// Substring -> network tag. Checked in order, so testnets come before the
/// chains they belong to.
const NETWORK_TAGS: &[(&str, &str)] = &[
    ("sepolia", "sepolia"),
    ("goerli", "goerli"),
    ("holesky", "holesky"),
    ("arbitrum", "arbitrum"),
    ("optimism", "optimism"),
    ("polygon", "polygon"),
    ("matic", "polygon"),
    ("base chain", "base"),
    ("on base", "base"),
    ("solana", "solana"),
    ("avalanche", "avalanche"),
    ("binance smart chain", "bsc"),
    ("bsc", "bsc"),
    ("mainnet", "mainnet"),
    ("ethereum", "ethereum"),
];

const TOKEN_STANDARD_TAGS: &[(&str, &str)] = &[
    ("erc20", "erc20"),
    ("erc-20", "erc20"),
    ("erc721", "erc721"),
    ("erc-721", "erc721"),
    ("erc1155", "erc1155"),
    ("erc-1155", "erc1155"),
];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Classify a free-text task. Buckets are exclusive and checked in order:
/// execution, blockchain query, analysis, general.
pub fn classify(description: &str) -> TaskAnalysis {
    let lower = description.to_lowercase();

    let domain = if contains_any(&lower, EXECUTION_KEYWORDS) {
        TaskDomain::Execution
    } else if contains_any(&lower, QUERY_KEYWORDS) {
        TaskDomain::BlockchainQuery
    } else if contains_any(&lower, ANALYSIS_KEYWORDS) {
        TaskDomain::Analysis
    } else {
        TaskDomain::General
    };

    let category = match domain {
        TaskDomain::Execution => {
            let tokenish =
                lower.contains("token") || lower.contains("erc20") || lower.contains("erc-20");
            if lower.contains("nft") || lower.contains("mint") {
                "nft_minting"
            } else if (lower.contains("deploy")
                || lower.contains("launch")
                || lower.contains("create"))
                && tokenish
            {
                "erc20_deployment"
            } else if lower.contains("deploy") {
                "smart_contract_deployment"
            } else if lower.contains("swap")
                || lower.contains("stake")
                || lower.contains("liquidity")
            {
                "defi_operations"
            } else if lower.contains("transfer")
                || lower.contains("send")
                || lower.contains("airdrop")
            {
                "token_transfer"
            } else {
                "blockchain_operations"
            }
        }
        TaskDomain::BlockchainQuery => "blockchain_query",
        TaskDomain::Analysis => {
            if lower.contains("market") || lower.contains("price") {
                "market_analysis"
            } else {
                "research_analysis"
            }
        }
        TaskDomain::General => {
            if contains_any(&lower, CODE_KEYWORDS) {
                "code_generation"
            } else if contains_any(&lower, PLANNING_KEYWORDS) {
                "task_orchestration"
            } else {
                "conversation"
            }
        }
    };

    let complexity = estimate_complexity(&lower, domain);

    TaskAnalysis {
        category: category.to_string(),
        domain,
        complexity,
        estimated_duration_sec: complexity.estimated_duration_sec(),
        required_capabilities: vec![category.to_string()],
    }
}

fn estimate_complexity(lower: &str, domain: TaskDomain) -> Complexity {
    let words = lower.split_whitespace().count();
    if contains_any(lower, MULTI_STEP_MARKERS) || words > 60 {
        Complexity::High
    } else if domain == TaskDomain::Execution || words > 25 {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}

/// Context tags found in the description, e.g. `("network", "sepolia")`.
pub fn extract_context_tags(description: &str) -> Vec<(&'static str, &'static str)> {
    let lower = description.to_lowercase();
    let mut tags = Vec::new();
    if let Some((_, network)) = NETWORK_TAGS.iter().find(|(k, _)| lower.contains(k)) {
        tags.push(("network", *network));
    }
    if let Some((_, standard)) = TOKEN_STANDARD_TAGS.iter().find(|(k, _)| lower.contains(k)) {
        tags.push(("token_standard", *standard));
    }
    tags
}

fn priority_tag(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
    }
}

/// Routes tasks to agents and owns all shared routing state.
///
/// Selection tries, in order: semantic matching, completion-based
/// selection (only when semantic matching degraded), capability scoring on
/// the classified category, then the configured default agent.
pub struct TaskRouter {
    context: RouterContext,
    scorer: CapabilityScorer,
    matcher: SemanticMatcher,
    negotiator: NegotiationCoordinator,
    synthesizer: CollaborationSynthesizer,
    traditional: Option<TraditionalSelector>,
    default_agent: String,
}

impl TaskRouter {
    /// Build a router, its agents and its external clients from config.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        config.validate()?;
        let llm = build_llm_client(&config.provider)?;
        let embedder = build_embedding_client(&config.provider)?;
        info!(
            provider = %config.provider.provider,
            completion = llm.is_some(),
            "Initializing task router"
        );
        Self::with_clients(config, embedder, llm)
    }

    /// Build a router around already constructed clients.
    pub fn with_clients(
        config: &RouterConfig,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut catalog = CapabilityCatalog::new();
        let mut agents = Vec::with_capacity(config.agents.len());
        for agent_config in &config.agents {
            let mut descriptor = agent_config.kind.default_descriptor(agent_config.id.clone());
            if !agent_config.capabilities.is_empty() {
                descriptor.capabilities = agent_config.capabilities.clone();
            }
            if !agent_config.specializations.is_empty() {
                descriptor.specializations = agent_config.specializations.clone();
            }
            catalog.register_descriptor(&descriptor);
            if let Some(metrics) = agent_config.metrics.clone() {
                catalog.set_metrics(&agent_config.id, metrics)?;
            }
            agents.push(build_agent(agent_config.kind, descriptor, llm.clone()));
        }
        for capability in &config.capabilities {
            catalog.register_capability(capability.clone());
        }
        for (phrase, alias) in &config.synonyms {
            catalog.register_synonym(phrase, alias.clone());
        }

        let mut context = RouterContext::new(catalog, &config.history);
        let registry = context.registry.get_mut();
        for agent in agents {
            registry.register(agent);
        }

        let scorer = CapabilityScorer::new(config.matching.min_candidate_score);
        info!(
            agents = config.agents.len(),
            capabilities = config.capabilities.len(),
            synonyms = config.synonyms.len(),
            "Task router ready"
        );

        Ok(Self {
            context,
            matcher: SemanticMatcher::new(embedder, llm.clone(), &config.matching),
            negotiator: NegotiationCoordinator::new(config.negotiation.clone(), scorer.clone()),
            synthesizer: CollaborationSynthesizer::new(),
            traditional: llm.map(TraditionalSelector::new),
            scorer,
            default_agent: config.matching.default_agent.clone(),
        })
    }

    pub fn context(&self) -> &RouterContext {
        &self.context
    }

    /// Whether completion-based selection is available.
    pub fn has_completion(&self) -> bool {
        self.traditional.is_some()
    }

    /// Embed every agent profile ahead of the first request. Failure is
    /// logged and retried lazily on the next `route` call.
    pub async fn initialize(&self) -> usize {
        match self.matcher.initialize(&self.context).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Embedding agent profiles failed, will retry on first route");
                0
            }
        }
    }

    /// Choose an agent for a free-text task.
    pub async fn route(
        &self,
        description: &str,
        priority: TaskPriority,
        context: HashMap<String, String>,
    ) -> Result<SelectionResult> {
        let analysis = classify(description);

        let mut context = context;
        for (key, value) in extract_context_tags(description) {
            context
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        context
            .entry("priority".to_string())
            .or_insert_with(|| priority_tag(priority).to_string());

        info!(
            domain = ?analysis.domain,
            category = %analysis.category,
            complexity = ?analysis.complexity,
            content_preview = %description.chars().take(50).collect::<String>(),
            "Routing task"
        );

        let mut reasoning = vec![format!(
            "Classified as {:?} task ({}, {:?} complexity)",
            analysis.domain, analysis.category, analysis.complexity
        )];

        let request = SemanticRequest::new(description)
            .requiring_execution(analysis.domain == TaskDomain::Execution);
        let selection = self.matcher.select_best_agent(&self.context, &request).await;
        let degraded = selection.degraded;

        if !degraded {
            if let Some(primary) = selection.matches.first() {
                reasoning.push(primary.reasoning.clone());
                let result = SelectionResult {
                    primary_agent: primary.agent_id.clone(),
                    alternative_agents: selection
                        .matches
                        .iter()
                        .skip(1)
                        .take(MAX_ALTERNATIVES)
                        .map(|m| m.agent_id.clone())
                        .collect(),
                    confidence: primary.confidence,
                    task_analysis: analysis,
                    reasoning,
                    degraded: false,
                    path: SelectionPath::Semantic,
                    context,
                };
                return Ok(self.finish(result));
            }
        } else if let Some(note) = selection.matches.first() {
            reasoning.push(note.reasoning.clone());
        }

        if degraded {
            if let Some(selector) = &self.traditional {
                let agents = self.registered_agents().await;
                match selector.select(description, &analysis, &agents).await {
                    Ok(choice) => {
                        reasoning.push(choice.reasoning);
                        let result = SelectionResult {
                            primary_agent: choice.agent_id,
                            alternative_agents: choice.alternatives,
                            confidence: choice.confidence,
                            task_analysis: analysis,
                            reasoning,
                            degraded,
                            path: SelectionPath::Traditional,
                            context,
                        };
                        return Ok(self.finish(result));
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Completion-based selection failed, falling back to scoring"
                        );
                    }
                }
            }
        }

        let requirement = TaskRequirement {
            category: analysis.category.clone(),
            priority,
            description: description.to_string(),
            context: context.clone(),
            ..Default::default()
        };
        let candidates = {
            let catalog = self.context.catalog.read().await;
            self.scorer.find_best_agents_for_task(&catalog, &requirement)
        };
        if let Some(primary) = candidates.first() {
            reasoning.push(primary.reasoning.clone());
            let result = SelectionResult {
                primary_agent: primary.agent_id.clone(),
                alternative_agents: candidates
                    .iter()
                    .skip(1)
                    .take(MAX_ALTERNATIVES)
                    .map(|m| m.agent_id.clone())
                    .collect(),
                confidence: primary.score,
                task_analysis: analysis,
                reasoning,
                degraded,
                path: SelectionPath::Scorer,
                context,
            };
            return Ok(self.finish(result));
        }

        if self.context.registry.read().await.contains(&self.default_agent) {
            reasoning.push(format!(
                "No scored candidate for '{}', using default agent {}",
                analysis.category, self.default_agent
            ));
            let result = SelectionResult {
                primary_agent: self.default_agent.clone(),
                alternative_agents: Vec::new(),
                confidence: DEFAULT_AGENT_CONFIDENCE,
                task_analysis: analysis,
                reasoning,
                degraded,
                path: SelectionPath::Default,
                context,
            };
            return Ok(self.finish(result));
        }

        Err(AgoraError::NoCandidate(format!(
            "no agent available for '{}'",
            analysis.category
        )))
    }

    fn finish(&self, result: SelectionResult) -> SelectionResult {
        info!(
            primary = %result.primary_agent,
            path = ?result.path,
            confidence = result.confidence,
            degraded = result.degraded,
            "Task routed"
        );
        result
    }

    /// Choose an agent for a structured requirement using capability
    /// scoring only.
    pub async fn route_requirement(
        &self,
        requirement: &TaskRequirement,
    ) -> Result<SelectionResult> {
        let candidates = {
            let catalog = self.context.catalog.read().await;
            self.scorer.find_best_agents_for_task(&catalog, requirement)
        };
        let primary = candidates.first().ok_or_else(|| {
            AgoraError::NoCandidate(format!("no agent offers {}", requirement.category))
        })?;

        let mut analysis = if requirement.description.trim().is_empty() {
            classify(&requirement.category)
        } else {
            classify(&requirement.description)
        };
        analysis.category = requirement.category.clone();
        analysis.required_capabilities = if requirement.required_capabilities.is_empty() {
            vec![requirement.category.clone()]
        } else {
            requirement.required_capabilities.iter().cloned().collect()
        };

        debug!(
            category = %requirement.category,
            candidates = candidates.len(),
            "Routing requirement by capability score"
        );

        let result = SelectionResult {
            primary_agent: primary.agent_id.clone(),
            alternative_agents: candidates
                .iter()
                .skip(1)
                .take(MAX_ALTERNATIVES)
                .map(|m| m.agent_id.clone())
                .collect(),
            confidence: primary.score,
            reasoning: candidates.iter().map(|m| m.reasoning.clone()).collect(),
            task_analysis: analysis,
            degraded: false,
            path: SelectionPath::Scorer,
            context: requirement.context.clone(),
        };
        Ok(self.finish(result))
    }

    /// Negotiate which agent takes over a task from `requesting_agent`.
    pub async fn delegate_task(
        &self,
        requesting_agent: &str,
        requirement: &TaskRequirement,
    ) -> Result<Negotiation> {
        self.negotiator
            .delegate_task(&self.context, requesting_agent, requirement)
            .await
    }

    pub async fn execute_collaborative_task(
        &self,
        primary_agent: &str,
        consulting_agents: &[String],
        requirement: &TaskRequirement,
    ) -> Result<CollaborativeResult> {
        self.synthesizer
            .execute_collaborative_task(
                &self.context,
                primary_agent,
                consulting_agents,
                requirement,
            )
            .await
    }

    pub async fn update_agent_metrics(
        &self,
        agent_id: &str,
        load_score: f32,
        success_rate: f32,
    ) -> Result<()> {
        self.context
            .catalog
            .write()
            .await
            .update_agent_metrics(agent_id, load_score, success_rate)
    }

    /// Add or replace an agent at runtime. Its profile is embedded on the
    /// next `route` call.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) {
        info!(agent_id = %agent.id(), "Registering agent");
        self.context.register_agent(agent).await;
    }

    pub async fn get_negotiation(&self, task_id: &str) -> Option<Negotiation> {
        self.context.negotiations.read().await.get(task_id).cloned()
    }

    /// Stored negotiations, most recent first.
    pub async fn negotiations(&self) -> Vec<Negotiation> {
        self.context.negotiations.read().await.recent().cloned().collect()
    }

    pub async fn collaboration_history(&self, agent_id: &str) -> Vec<CollaborativeResult> {
        self.synthesizer.history(&self.context, agent_id).await
    }

    pub async fn registered_agents(&self) -> Vec<AgentProfile> {
        self.context.catalog.read().await.registered_agents().to_vec()
    }

    pub async fn get_agent(&self, agent_id: &str) -> Option<AgentProfile> {
        self.context.catalog.read().await.agent(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_precedence() {
        // execution wins over the query and analysis keywords it also contains
        let analysis = classify("Check my balance and transfer 5 USDC to bob");
        assert_eq!(analysis.domain, TaskDomain::Execution);
        assert_eq!(analysis.category, "token_transfer");

        let analysis = classify("What is the balance of this wallet address?");
        assert_eq!(analysis.domain, TaskDomain::BlockchainQuery);
        assert_eq!(analysis.category, "blockchain_query");

        let analysis = classify("Research the market trend for L2 tokens");
        assert_eq!(analysis.domain, TaskDomain::Analysis);
        assert_eq!(analysis.category, "market_analysis");

        let analysis = classify("Hi there, how are you today?");
        assert_eq!(analysis.domain, TaskDomain::General);
        assert_eq!(analysis.category, "conversation");
    }

    #[test]
    fn test_classify_execution_categories() {
        assert_eq!(classify("Mint 10 NFTs for my collection").category, "nft_minting");
        assert_eq!(classify("Deploy an ERC20 token called FOO").category, "erc20_deployment");
        assert_eq!(classify("Deploy this escrow contract").category, "smart_contract_deployment");
        assert_eq!(classify("Swap 1 ETH for USDC").category, "defi_operations");
        assert_eq!(classify("Execute the queued proposal").category, "blockchain_operations");
    }

    #[test]
    fn test_classify_general_categories() {
        assert_eq!(classify("Write solidity code for a vault").category, "code_generation");
        assert_eq!(classify("Plan a workflow for onboarding").category, "task_orchestration");
    }

    #[test]
    fn test_complexity_heuristic() {
        assert_eq!(classify("hello").complexity, Complexity::Low);
        assert_eq!(classify("Send 1 ETH to alice").complexity, Complexity::Medium);
        let multi = classify("Deploy a token and then airdrop it to holders");
        assert_eq!(multi.complexity, Complexity::High);
        assert_eq!(multi.estimated_duration_sec, 300);
    }

    #[test]
    fn test_extract_context_tags() {
        let tags = extract_context_tags("Deploy an ERC-20 on Ethereum Sepolia");
        assert!(tags.contains(&("network", "sepolia")));
        assert!(tags.contains(&("token_standard", "erc20")));

        assert_eq!(
            extract_context_tags("bridge to polygon"),
            vec![("network", "polygon")]
        );
        assert!(extract_context_tags("tell me a joke").is_empty());
    }
}
