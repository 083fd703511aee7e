//! Embedding-based agent ranking.
//!
//! Every agent profile is rendered to text and embedded once; requests are
//! embedded on arrival and ranked by cosine similarity. Requests with
//! execution intent put execution-capable agents first. Close scores are
//! settled by a configurable precedence table.
//!
//! Losing the embedding service degrades to a single low-confidence default
//! match. Losing the completion service only affects the justification text.

use agora_common::Result;
use agora_llm::{EmbeddingClient, LlmClient, LlmRequest, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::AgentProfile;
use crate::config::{MatchingConfig, TieBreakRule};
use crate::context::RouterContext;

/// Words that signal the caller wants something done, not explained.
const EXECUTION_VERBS: &[&str] = &["transfer", "deploy", "mint", "execute"];

/// Confidence given to the fallback match when embeddings are unavailable.
const DEGRADED_CONFIDENCE: f32 = 0.5;

const JUSTIFICATION_PROMPT: &str = "You explain routing decisions in a multi-agent system. \
Given a task and the agent chosen for it, reply with one short sentence saying why the agent fits. \
No preamble.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticRequest {
    pub task_description: String,

    /// Only execution-capable agents should lead the ranking
    #[serde(default)]
    pub require_execution: bool,
}

impl SemanticRequest {
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            task_description: task_description.into(),
            require_execution: false,
        }
    }

    pub fn requiring_execution(mut self, require: bool) -> Self {
        self.require_execution = require;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub agent_id: String,

    /// Raw cosine similarity
    pub similarity: f32,

    /// Similarity clamped to [0, 1]
    pub confidence: f32,

    pub can_execute: bool,

    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSelection {
    /// Best first
    pub matches: Vec<SemanticMatch>,

    /// True when the embedding service failed and a default was returned
    pub degraded: bool,
}

/// Pairwise precedence between agent ids.
#[derive(Debug, Clone, Default)]
pub struct TieBreakTable {
    rules: Vec<TieBreakRule>,
}

impl TieBreakTable {
    pub fn new(rules: Vec<TieBreakRule>) -> Self {
        Self { rules }
    }

    /// Whether `a` should come before `b` when their scores are close.
    pub fn prefers(&self, a: &str, b: &str) -> bool {
        self.rules.iter().any(|r| r.preferred == a && r.over == b)
    }

    pub fn rules(&self) -> &[TieBreakRule] {
        &self.rules
    }
}

/// Text that represents an agent in embedding space.
pub fn profile_text(profile: &AgentProfile) -> String {
    format!(
        "Agent: {}\nDescription: {}\nKeywords: {}\nCapabilities: {}\nUse cases: {}",
        profile.name,
        profile.description,
        profile.keywords.join(", "),
        profile.capabilities.join(", "),
        profile.use_cases.join("; ")
    )
}

pub fn has_execution_intent(description: &str) -> bool {
    let lower = description.to_lowercase();
    EXECUTION_VERBS.iter().any(|v| lower.contains(v))
}

pub struct SemanticMatcher {
    embedder: Arc<dyn EmbeddingClient>,
    llm: Option<Arc<dyn LlmClient>>,
    tie_breaks: TieBreakTable,
    tie_margin: f32,
    justification_count: usize,
    default_agent: String,
}

impl SemanticMatcher {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        llm: Option<Arc<dyn LlmClient>>,
        matching: &MatchingConfig,
    ) -> Self {
        Self {
            embedder,
            llm,
            tie_breaks: TieBreakTable::new(matching.tie_break.clone()),
            tie_margin: matching.tie_margin,
            justification_count: matching.justification_count,
            default_agent: matching.default_agent.clone(),
        }
    }

    pub fn tie_breaks(&self) -> &TieBreakTable {
        &self.tie_breaks
    }

    /// Embed every profile that has no cached embedding yet. Returns the
    /// number of profiles embedded.
    pub async fn initialize(&self, ctx: &RouterContext) -> Result<usize> {
        let pending: Vec<(String, String)> = {
            let catalog = ctx.catalog.read().await;
            catalog
                .registered_agents()
                .iter()
                .filter(|p| p.embedding.is_none())
                .map(|p| (p.id.clone(), profile_text(p)))
                .collect()
        };
        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pending.iter().map(|(_, t)| t.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let mut catalog = ctx.catalog.write().await;
        for ((id, _), vector) in pending.iter().zip(vectors) {
            // The agent may have been re-registered while we were embedding.
            if catalog.agent(id).is_some_and(|p| p.embedding.is_none()) {
                catalog.set_agent_embedding(id, vector)?;
            }
        }

        info!(
            agents = pending.len(),
            model = %self.embedder.model_name(),
            "Embedded agent profiles"
        );
        Ok(pending.len())
    }

    /// Rank every registered agent against the request.
    pub async fn select_best_agent(
        &self,
        ctx: &RouterContext,
        request: &SemanticRequest,
    ) -> SemanticSelection {
        let query = match self.embedder.embed(&request.task_description).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding request failed, using default agent");
                return self.degraded();
            }
        };

        if let Err(e) = self.initialize(ctx).await {
            warn!(error = %e, "Embedding agent profiles failed, using default agent");
            return self.degraded();
        }

        let mut ranked: Vec<SemanticMatch> = {
            let catalog = ctx.catalog.read().await;
            catalog
                .registered_agents()
                .iter()
                .filter_map(|p| {
                    let embedding = p.embedding.as_ref()?;
                    let similarity = cosine_similarity(&query, embedding);
                    Some(SemanticMatch {
                        agent_id: p.id.clone(),
                        similarity,
                        confidence: similarity.clamp(0.0, 1.0),
                        can_execute: p.can_execute,
                        reasoning: String::new(),
                    })
                })
                .collect()
        };

        let execution =
            request.require_execution || has_execution_intent(&request.task_description);
        ranked.sort_by(|a, b| {
            let group = if execution {
                b.can_execute.cmp(&a.can_execute)
            } else {
                Ordering::Equal
            };
            group.then_with(|| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(Ordering::Equal)
            })
        });
        self.apply_tie_breaks(&mut ranked, execution);
        self.justify(&mut ranked, &request.task_description).await;

        debug!(
            execution,
            top = ?ranked.first().map(|m| (&m.agent_id, m.similarity)),
            candidates = ranked.len(),
            "Semantic ranking complete"
        );

        SemanticSelection {
            matches: ranked,
            degraded: false,
        }
    }

    fn degraded(&self) -> SemanticSelection {
        SemanticSelection {
            matches: vec![SemanticMatch {
                agent_id: self.default_agent.clone(),
                similarity: 0.0,
                confidence: DEGRADED_CONFIDENCE,
                can_execute: false,
                reasoning: format!(
                    "Embedding service unavailable; defaulting to {}",
                    self.default_agent
                ),
            }],
            degraded: true,
        }
    }

    /// Swap neighbours whose similarities are within the margin when the
    /// table prefers the lower one. Execution groups are never mixed.
    fn apply_tie_breaks(&self, ranked: &mut [SemanticMatch], execution: bool) {
        for i in 0..ranked.len().saturating_sub(1) {
            let (upper, lower) = (&ranked[i], &ranked[i + 1]);
            if execution && upper.can_execute != lower.can_execute {
                continue;
            }
            let close =
                (upper.similarity - lower.similarity).abs() <= self.tie_margin + f32::EPSILON;
            if close && self.tie_breaks.prefers(&lower.agent_id, &upper.agent_id) {
                debug!(
                    preferred = %lower.agent_id,
                    over = %upper.agent_id,
                    "Applied tie-break rule"
                );
                ranked.swap(i, i + 1);
            }
        }
    }

    async fn justify(&self, ranked: &mut [SemanticMatch], description: &str) {
        for (i, m) in ranked.iter_mut().enumerate() {
            let template = format!(
                "{} matches the task with similarity {:.2}",
                m.agent_id, m.similarity
            );
            m.reasoning = match self.llm.as_ref() {
                Some(llm) if i < self.justification_count => {
                    let request = LlmRequest::prompt(
                        JUSTIFICATION_PROMPT,
                        format!("Task: {description}\nChosen agent: {}", m.agent_id),
                    )
                    .with_max_tokens(80)
                    .with_temperature(0.2);
                    match llm.complete(request).await {
                        Ok(response) if !response.content.trim().is_empty() => {
                            response.content.trim().to_string()
                        }
                        Ok(_) => template,
                        Err(e) => {
                            debug!(
                                agent_id = %m.agent_id,
                                error = %e,
                                "Justification failed, using template"
                            );
                            template
                        }
                    }
                }
                _ => template,
            };
        }
    }
}
