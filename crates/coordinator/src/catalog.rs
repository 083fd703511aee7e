//! Capability catalog: capabilities, agent profiles and their metrics.
//!
//! The catalog is the single owner of [`AgentProfile`]s. Other components
//! read profiles through the router context and never keep mutable copies.

use agora_common::{AgentDescriptor, AgoraError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A named unit of functionality and the agents that provide it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Task-specific names that resolve to this capability
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Ids of the agents providing this capability
    #[serde(default)]
    pub agents: Vec<String>,

    #[serde(default = "default_priority")]
    pub priority: f32,
}

fn default_priority() -> f32 {
    1.0
}

impl Capability {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            aliases: Vec::new(),
            agents: Vec::new(),
            priority: default_priority(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_agents(mut self, agents: &[&str]) -> Self {
        self.agents = agents.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether `name` is this capability's id or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.id.eq_ignore_ascii_case(name) || self.has_alias(name)
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Best-effort telemetry about an agent. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Fraction of recent tasks that succeeded (0.0 - 1.0)
    #[serde(default = "default_success_rate")]
    pub success_rate: f32,

    /// Current load (0.0 idle - 1.0 saturated)
    #[serde(default)]
    pub load_score: f32,

    #[serde(default)]
    pub average_latency_ms: u64,

    /// Relative cost of using the agent (0.0 - 1.0)
    #[serde(default = "default_cost_factor")]
    pub cost_factor: f32,
}

fn default_success_rate() -> f32 {
    1.0
}

fn default_cost_factor() -> f32 {
    0.5
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            success_rate: default_success_rate(),
            load_score: 0.0,
            average_latency_ms: 0,
            cost_factor: default_cost_factor(),
        }
    }
}

impl PerformanceMetrics {
    fn clamped(mut self) -> Self {
        self.success_rate = self.success_rate.clamp(0.0, 1.0);
        self.load_score = self.load_score.clamp(0.0, 1.0);
        self.cost_factor = self.cost_factor.clamp(0.0, 1.0);
        self
    }
}

/// Everything the router knows about one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub can_execute: bool,
    pub metrics: PerformanceMetrics,

    /// Cached embedding of the profile text, filled in lazily
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl AgentProfile {
    fn from_descriptor(descriptor: &AgentDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: if descriptor.name.is_empty() {
                descriptor.id.clone()
            } else {
                descriptor.name.clone()
            },
            description: descriptor.description.clone(),
            keywords: descriptor.keywords.clone(),
            capabilities: descriptor.capabilities.clone(),
            specializations: descriptor.specializations.clone(),
            use_cases: descriptor.use_cases.clone(),
            can_execute: descriptor.can_execute,
            metrics: PerformanceMetrics::default(),
            embedding: None,
        }
    }
}

/// Normalise a synonym phrase: lowercase, `_`/`-` read as spaces.
fn synonym_key(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Registry of capabilities and agent profiles, in registration order.
#[derive(Debug, Default)]
pub struct CapabilityCatalog {
    capabilities: Vec<Capability>,
    capability_index: HashMap<String, usize>,
    agents: Vec<AgentProfile>,
    agent_index: HashMap<String, usize>,
    synonyms: HashMap<String, String>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a capability by id.
    pub fn register_capability(&mut self, capability: Capability) {
        debug!(
            capability = %capability.id,
            agents = ?capability.agents,
            "Registering capability"
        );
        match self.capability_index.get(&capability.id) {
            Some(&i) => self.capabilities[i] = capability,
            None => {
                self.capability_index
                    .insert(capability.id.clone(), self.capabilities.len());
                self.capabilities.push(capability);
            }
        }
    }

    /// Register a bare agent with default metrics.
    pub fn register_agent(
        &mut self,
        id: impl Into<String>,
        capabilities: Vec<String>,
        specializations: Vec<String>,
    ) {
        let descriptor = AgentDescriptor {
            id: id.into(),
            capabilities,
            specializations,
            ..Default::default()
        };
        self.register_descriptor(&descriptor);
    }

    /// Register an agent from its full descriptor. Re-registering an id
    /// replaces the profile in place and resets its metrics.
    pub fn register_descriptor(&mut self, descriptor: &AgentDescriptor) {
        let profile = AgentProfile::from_descriptor(descriptor);
        info!(
            agent_id = %profile.id,
            capabilities = profile.capabilities.len(),
            can_execute = profile.can_execute,
            "Registering agent profile"
        );
        match self.agent_index.get(&profile.id) {
            Some(&i) => self.agents[i] = profile,
            None => {
                self.agent_index.insert(profile.id.clone(), self.agents.len());
                self.agents.push(profile);
            }
        }
    }

    /// Overwrite load and success rate. Inputs are clamped to [0, 1].
    pub fn update_agent_metrics(
        &mut self,
        id: &str,
        load_score: f32,
        success_rate: f32,
    ) -> Result<()> {
        let profile = self.agent_mut(id)?;
        profile.metrics.load_score = load_score.clamp(0.0, 1.0);
        profile.metrics.success_rate = success_rate.clamp(0.0, 1.0);
        debug!(
            agent_id = %id,
            load_score = profile.metrics.load_score,
            success_rate = profile.metrics.success_rate,
            "Updated agent metrics"
        );
        Ok(())
    }

    /// Replace the full metrics record.
    pub fn set_metrics(&mut self, id: &str, metrics: PerformanceMetrics) -> Result<()> {
        self.agent_mut(id)?.metrics = metrics.clamped();
        Ok(())
    }

    pub fn set_agent_embedding(&mut self, id: &str, embedding: Vec<f32>) -> Result<()> {
        self.agent_mut(id)?.embedding = Some(embedding);
        Ok(())
    }

    pub fn register_synonym(&mut self, phrase: &str, alias: impl Into<String>) {
        self.synonyms.insert(synonym_key(phrase), alias.into());
    }

    /// Canonical alias a phrase maps to, if any.
    pub fn synonym(&self, phrase: &str) -> Option<&str> {
        self.synonyms.get(&synonym_key(phrase)).map(String::as_str)
    }

    /// Expand a capability name into the names it stands for.
    ///
    /// A known capability yields its aliases, a synonym yields its canonical
    /// alias, anything else yields itself.
    pub fn normalize_capability(&self, name: &str) -> Vec<String> {
        if let Some(cap) = self.capability(name) {
            if !cap.aliases.is_empty() {
                return cap.aliases.clone();
            }
            return vec![cap.id.clone()];
        }
        if let Some(alias) = self.synonym(name) {
            return vec![alias.to_string()];
        }
        vec![name.to_string()]
    }

    pub fn capability_description(&self, name: &str) -> String {
        match self.capability(name) {
            Some(cap) => cap.description.clone(),
            None => format!("Unknown capability: {name}"),
        }
    }

    pub fn capability(&self, id: &str) -> Option<&Capability> {
        self.capability_index.get(id).map(|&i| &self.capabilities[i])
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Capabilities listing `name` as an alias.
    pub fn capabilities_with_alias<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Capability> + 'a {
        self.capabilities.iter().filter(move |c| c.has_alias(name))
    }

    pub fn agent(&self, id: &str) -> Option<&AgentProfile> {
        self.agent_index.get(id).map(|&i| &self.agents[i])
    }

    /// All profiles, in registration order.
    pub fn registered_agents(&self) -> &[AgentProfile] {
        &self.agents
    }

    /// Registration position of an agent, used to break score ties.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.agent_index.get(id).copied()
    }

    /// Agents offering `capability`, either listed on the catalog entry that
    /// answers to the name or carrying it in their own capability list.
    pub fn agents_with_capability(&self, capability: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for cap in self.capabilities.iter().filter(|c| c.answers_to(capability)) {
            for agent in &cap.agents {
                if !ids.contains(agent) {
                    ids.push(agent.clone());
                }
            }
        }
        for profile in &self.agents {
            let has = profile
                .capabilities
                .iter()
                .any(|c| c.eq_ignore_ascii_case(capability));
            if has && !ids.contains(&profile.id) {
                ids.push(profile.id.clone());
            }
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn agent_mut(&mut self, id: &str) -> Result<&mut AgentProfile> {
        match self.agent_index.get(id) {
            Some(&i) => Ok(&mut self.agents[i]),
            None => Err(AgoraError::UnknownAgent(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CapabilityCatalog {
        let mut catalog = CapabilityCatalog::new();
        catalog.register_capability(
            Capability::new("token_deployment", "Deploy fungible tokens")
                .with_aliases(&["erc20_deployment", "token_creation"])
                .with_agents(&["blockchain-agent"]),
        );
        catalog.register_agent(
            "blockchain-agent",
            vec!["erc20_deployment".into(), "token_transfer".into()],
            vec!["erc20".into()],
        );
        catalog.register_agent("research-agent", vec!["market_analysis".into()], vec![]);
        catalog
    }

    #[test]
    fn test_register_agent_round_trip() {
        let catalog = catalog();
        let agents = catalog.registered_agents();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, "blockchain-agent");
        assert_eq!(agents[0].capabilities, vec!["erc20_deployment", "token_transfer"]);
        assert_eq!(agents[0].metrics.success_rate, 1.0);
        assert_eq!(agents[0].metrics.load_score, 0.0);
    }

    #[test]
    fn test_register_capability_is_upsert() {
        let mut catalog = catalog();
        catalog.register_capability(
            Capability::new("token_deployment", "Replaced").with_agents(&["research-agent"]),
        );
        assert_eq!(catalog.capabilities().len(), 1);
        assert_eq!(catalog.capability_description("token_deployment"), "Replaced");
    }

    #[test]
    fn test_reregister_agent_keeps_position() {
        let mut catalog = catalog();
        catalog.update_agent_metrics("blockchain-agent", 0.9, 0.2).unwrap();
        catalog.register_agent("blockchain-agent", vec!["nft_minting".into()], vec![]);
        assert_eq!(catalog.position("blockchain-agent"), Some(0));
        let profile = catalog.agent("blockchain-agent").unwrap();
        assert_eq!(profile.capabilities, vec!["nft_minting"]);
        assert_eq!(profile.metrics.load_score, 0.0);
    }

    #[test]
    fn test_update_metrics_overwrites_and_clamps() {
        let mut catalog = catalog();
        catalog.update_agent_metrics("research-agent", 0.4, 0.9).unwrap();
        catalog.update_agent_metrics("research-agent", 1.5, -1.0).unwrap();
        let m = catalog.agent("research-agent").unwrap().metrics;
        assert_eq!(m.load_score, 1.0);
        assert_eq!(m.success_rate, 0.0);
    }

    #[test]
    fn test_update_metrics_unknown_agent() {
        let mut catalog = catalog();
        let err = catalog.update_agent_metrics("ghost", 0.1, 0.1).unwrap_err();
        assert!(matches!(err, AgoraError::UnknownAgent(ref id) if id == "ghost"));
    }

    #[test]
    fn test_normalize_capability() {
        let mut catalog = catalog();
        catalog.register_synonym("create token", "erc20_deployment");

        assert_eq!(
            catalog.normalize_capability("token_deployment"),
            vec!["erc20_deployment", "token_creation"]
        );
        assert_eq!(catalog.normalize_capability("Create_Token"), vec!["erc20_deployment"]);
        assert_eq!(catalog.normalize_capability("teleport"), vec!["teleport"]);
    }

    #[test]
    fn test_capability_description_unknown() {
        let catalog = catalog();
        assert_eq!(
            catalog.capability_description("teleport"),
            "Unknown capability: teleport"
        );
    }

    #[test]
    fn test_agents_with_capability() {
        let catalog = catalog();
        assert_eq!(catalog.agents_with_capability("token_creation"), vec!["blockchain-agent"]);
        assert_eq!(catalog.agents_with_capability("market_analysis"), vec!["research-agent"]);
        assert!(catalog.agents_with_capability("teleport").is_empty());
    }
}
