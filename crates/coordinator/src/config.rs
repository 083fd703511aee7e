//! Configuration for the task router.
//!
//! # Security
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing API keys
//! - Warns about API keys stored in config files

use agora_agents::AgentKind;
use agora_common::{AgoraError, Result};
use agora_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::catalog::{Capability, PerformanceMetrics};

/// Hard ceiling on negotiation rounds.
pub const MAX_ROUNDS: u8 = 3;

/// Main router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Completion and embedding provider
    #[serde(default)]
    pub provider: LlmConfig,

    #[serde(default)]
    pub negotiation: NegotiationConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    /// Capability catalog. Omitting the section keeps the built-in catalog.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<CapabilityConfig>,

    /// Agents to construct. Omitting the section keeps the built-in agents.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,

    /// Phrase -> canonical capability alias
    #[serde(default = "default_synonyms")]
    pub synonyms: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Bidding rounds before falling back (1..=3)
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u8,

    /// Candidates asked to bid each round
    #[serde(default = "default_bid_pool")]
    pub bid_pool: usize,

    /// Top bidders that consult each other from round 2 on
    #[serde(default = "default_consultation_pool")]
    pub consultation_pool: usize,

    /// Total bid score a winner must exceed
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f32,
}

fn default_max_rounds() -> u8 {
    MAX_ROUNDS
}

fn default_bid_pool() -> usize {
    5
}

fn default_consultation_pool() -> usize {
    3
}

fn default_acceptance_threshold() -> f32 {
    0.6
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            bid_pool: default_bid_pool(),
            consultation_pool: default_consultation_pool(),
            acceptance_threshold: default_acceptance_threshold(),
        }
    }
}

/// Pairwise precedence applied when two similarity scores are close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakRule {
    pub preferred: String,
    pub over: String,
}

impl TieBreakRule {
    pub fn new(preferred: impl Into<String>, over: impl Into<String>) -> Self {
        Self {
            preferred: preferred.into(),
            over: over.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Candidates at or below this score are not handed to negotiation
    #[serde(default = "default_min_candidate_score")]
    pub min_candidate_score: f32,

    /// Similarity gap within which tie-break rules apply
    #[serde(default = "default_tie_margin")]
    pub tie_margin: f32,

    /// How many top matches get a generated justification
    #[serde(default = "default_justification_count")]
    pub justification_count: usize,

    /// Agent used when every selection path has failed
    #[serde(default = "default_agent")]
    pub default_agent: String,

    #[serde(default = "default_tie_breaks")]
    pub tie_break: Vec<TieBreakRule>,
}

fn default_min_candidate_score() -> f32 {
    0.3
}

fn default_tie_margin() -> f32 {
    0.1
}

fn default_justification_count() -> usize {
    3
}

fn default_agent() -> String {
    "companion-agent".into()
}

fn default_tie_breaks() -> Vec<TieBreakRule> {
    vec![
        TieBreakRule::new("blockchain-agent", "research-agent"),
        TieBreakRule::new("blockchain-agent", "code-agent"),
        TieBreakRule::new("code-agent", "research-agent"),
        TieBreakRule::new("research-agent", "companion-agent"),
        TieBreakRule::new("orchestrator-agent", "companion-agent"),
    ]
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_candidate_score: default_min_candidate_score(),
            tie_margin: default_tie_margin(),
            justification_count: default_justification_count(),
            default_agent: default_agent(),
            tie_break: default_tie_breaks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Negotiations kept, oldest evicted first
    #[serde(default = "default_negotiation_capacity")]
    pub negotiation_capacity: usize,

    /// Collaborative results kept per agent
    #[serde(default = "default_collaborations_per_agent")]
    pub collaborations_per_agent: usize,
}

fn default_negotiation_capacity() -> usize {
    1024
}

fn default_collaborations_per_agent() -> usize {
    64
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            negotiation_capacity: default_negotiation_capacity(),
            collaborations_per_agent: default_collaborations_per_agent(),
        }
    }
}

pub type CapabilityConfig = Capability;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,

    pub kind: AgentKind,

    /// Overrides the kind's built-in capabilities when non-empty
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Overrides the kind's built-in specializations when non-empty
    #[serde(default)]
    pub specializations: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            capabilities: Vec::new(),
            specializations: Vec::new(),
            metrics: None,
        }
    }
}

fn default_agents() -> Vec<AgentConfig> {
    AgentKind::ALL
        .iter()
        .map(|kind| AgentConfig::new(kind.default_id(), *kind))
        .collect()
}

fn default_capabilities() -> Vec<CapabilityConfig> {
    vec![
        Capability::new("token_deployment", "Deploy fungible (ERC20) tokens")
            .with_aliases(&["erc20_deployment", "token_creation", "deploy_token"])
            .with_agents(&["blockchain-agent"]),
        Capability::new("nft_operations", "Mint and deploy NFT collections")
            .with_aliases(&["nft_minting", "mint_nft", "nft_creation", "erc721_deployment"])
            .with_agents(&["blockchain-agent"])
            .with_priority(0.9),
        Capability::new("token_transfer", "Send tokens between wallets")
            .with_aliases(&["token_transfer", "send_tokens", "transfer"])
            .with_agents(&["blockchain-agent"]),
        Capability::new("wallet_management", "Create and manage wallets")
            .with_aliases(&["wallet_management", "wallet_creation"])
            .with_agents(&["blockchain-agent"])
            .with_priority(0.8),
        Capability::new("defi_operations", "Swaps, staking and liquidity provision")
            .with_aliases(&["defi_operations", "token_swap", "staking", "liquidity_provision"])
            .with_agents(&["blockchain-agent"])
            .with_priority(0.9),
        Capability::new("smart_contract_deployment", "Deploy compiled contracts")
            .with_aliases(&["smart_contract_deployment", "contract_deployment"])
            .with_agents(&["blockchain-agent"]),
        Capability::new("blockchain_query", "Read balances, transactions and gas prices")
            .with_aliases(&[
                "blockchain_query",
                "balance_check",
                "transaction_lookup",
                "gas_estimate",
            ])
            .with_agents(&["research-agent", "blockchain-agent"])
            .with_priority(0.8),
        Capability::new("research_analysis", "Market and protocol research")
            .with_aliases(&[
                "research_analysis",
                "market_analysis",
                "data_analysis",
                "token_research",
            ])
            .with_agents(&["research-agent"])
            .with_priority(0.8),
        Capability::new("code_generation", "Write and review code and contracts")
            .with_aliases(&[
                "code_generation",
                "smart_contract_development",
                "code_review",
                "contract_audit",
            ])
            .with_agents(&["code-agent"])
            .with_priority(0.8),
        Capability::new("companion_chat", "Casual conversation and support")
            .with_aliases(&["companion_chat", "conversation", "emotional_support", "greeting"])
            .with_agents(&["companion-agent"])
            .with_priority(0.5),
        Capability::new("task_orchestration", "Plan and coordinate multi-step tasks")
            .with_aliases(&[
                "task_orchestration",
                "workflow_planning",
                "task_decomposition",
                "multi_step_task",
            ])
            .with_agents(&["orchestrator-agent"])
            .with_priority(0.7),
    ]
}

fn default_synonyms() -> BTreeMap<String, String> {
    [
        ("create token", "erc20_deployment"),
        ("launch token", "erc20_deployment"),
        ("issue token", "erc20_deployment"),
        ("make nft", "nft_minting"),
        ("create nft", "nft_minting"),
        ("send crypto", "token_transfer"),
        ("send money", "token_transfer"),
        ("pay", "token_transfer"),
        ("swap", "token_swap"),
        ("exchange tokens", "token_swap"),
        ("check balance", "balance_check"),
        ("market research", "market_analysis"),
        ("price analysis", "market_analysis"),
        ("write code", "code_generation"),
        ("audit contract", "contract_audit"),
        ("chat", "conversation"),
        ("talk", "conversation"),
        ("plan workflow", "workflow_planning"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            provider: LlmConfig::default(),
            negotiation: NegotiationConfig::default(),
            matching: MatchingConfig::default(),
            history: HistoryConfig::default(),
            capabilities: default_capabilities(),
            agents: default_agents(),
            synonyms: default_synonyms(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix systems this validates that:
    /// - The file is a regular file (not a symlink)
    /// - The file is not world-readable if it contains an API key
    /// - Warns if API keys are stored in the config file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        if config.provider.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. For better security, \
                 use the OPENAI_API_KEY environment variable instead.",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    ///
    /// Use this only for testing or when you've already validated the file.
    pub fn from_file_unchecked(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reject configurations the router cannot start with.
    pub fn validate(&self) -> Result<()> {
        let mut agent_ids = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(AgoraError::Config("Agent with empty id".into()));
            }
            if !agent_ids.insert(agent.id.as_str()) {
                return Err(AgoraError::Config(format!("Duplicate agent id: {}", agent.id)));
            }
        }

        let mut capability_ids = HashSet::new();
        for cap in &self.capabilities {
            if cap.id.trim().is_empty() {
                return Err(AgoraError::Config("Capability with empty id".into()));
            }
            if !capability_ids.insert(cap.id.as_str()) {
                return Err(AgoraError::Config(format!(
                    "Duplicate capability id: {}",
                    cap.id
                )));
            }
            if let Some(unknown) = cap.agents.iter().find(|a| !agent_ids.contains(a.as_str())) {
                return Err(AgoraError::Config(format!(
                    "Capability '{}' names unknown agent '{}'",
                    cap.id, unknown
                )));
            }
        }

        if !(1..=MAX_ROUNDS).contains(&self.negotiation.max_rounds) {
            return Err(AgoraError::Config(format!(
                "negotiation.max_rounds must be between 1 and {MAX_ROUNDS}, got {}",
                self.negotiation.max_rounds
            )));
        }
        if self.negotiation.bid_pool == 0 {
            return Err(AgoraError::Config("negotiation.bid_pool must be at least 1".into()));
        }

        for (name, value) in [
            ("negotiation.acceptance_threshold", self.negotiation.acceptance_threshold),
            ("matching.min_candidate_score", self.matching.min_candidate_score),
            ("matching.tie_margin", self.matching.tie_margin),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AgoraError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        for rule in &self.matching.tie_break {
            for id in [&rule.preferred, &rule.over] {
                if !agent_ids.contains(id.as_str()) {
                    return Err(AgoraError::Config(format!(
                        "Tie-break rule names unknown agent '{id}'"
                    )));
                }
            }
        }

        if !agent_ids.contains(self.matching.default_agent.as_str()) {
            return Err(AgoraError::Config(format!(
                "Default agent '{}' is not configured",
                self.matching.default_agent
            )));
        }

        Ok(())
    }
}

/// Validate config file permissions on Unix systems.
///
/// Requirements:
/// - File must be a regular file (not symlink, directory, etc.)
/// - File must not be world-writable (mode & 0o002 == 0)
/// - If file contains API key patterns, must not be world-readable
#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_api_key = content.contains("api_key")
        && (content.contains("sk-") || content.contains("key ="));

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
