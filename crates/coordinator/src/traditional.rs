//! Completion-based agent selection.
//!
//! Used when semantic matching is unavailable. The completion service is
//! shown the registered agents and asked for a JSON choice.
//!
//! # Security
//!
//! - Chosen agent validated against the registered agent whitelist
//! - Reasoning sanitized for prompt-injection phrases and length
//! - Confidence range validation
//! - Input content validation

use agora_common::{AgoraError, Result};
use agora_llm::{LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::AgentProfile;
use crate::routing::TaskAnalysis;

/// Maximum length for the reasoning field.
const MAX_REASONING_LENGTH: usize = 500;

/// Maximum length for user input content.
const MAX_INPUT_CONTENT_LENGTH: usize = 10_000;

/// Alternatives kept from a completion answer.
const MAX_ALTERNATIVES: usize = 3;

/// Phrases in model output that suggest the model was steered by the input.
const JAILBREAK_PATTERNS: &[&str] = &[
    "ignore previous",
    "ignore all previous",
    "ignore prior",
    "forget previous",
    "forget all",
    "disregard previous",
    "override previous",
    "new instructions",
    "system prompt",
    "you are now",
    "act as if",
    "pretend you are",
    "bypass",
    "jailbreak",
];

const SELECTION_SYSTEM_PROMPT: &str = r#"You are the task router of a multi-agent system.

Pick the single agent best suited to the user's task from the list you are given.

IMPORTANT: Respond ONLY with a JSON object, no other text. The JSON must have this exact structure:

{
  "agent": "<one agent id from the list>",
  "confidence": 0.0-1.0,
  "reasoning": "brief explanation of your choice",
  "alternatives": ["<other suitable agent ids, best first>"]
}

Rules:
- "agent" MUST be an id from the list, copied exactly
- Prefer agents that can execute when the user wants something done on-chain
- "confidence" should reflect how certain you are (0.0 = guess, 1.0 = certain)

Example:

Agents:
- blockchain-agent: Executes on-chain operations (can execute)
- research-agent: Researches markets and on-chain data

Task: Send 10 USDC to my friend
{"agent":"blockchain-agent","confidence":0.9,"reasoning":"Token transfer needs on-chain execution","alternatives":[]}"#;

/// An agent choice returned by the completion service, already validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraditionalChoice {
    pub agent_id: String,
    pub confidence: f32,
    pub reasoning: String,
    pub alternatives: Vec<String>,
}

fn contains_injection_pattern(content: &str) -> Option<&'static str> {
    let lower = content.to_lowercase();
    JAILBREAK_PATTERNS.iter().copied().find(|p| lower.contains(p))
}

fn validate_confidence(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

fn sanitize_reasoning(reasoning: &str) -> String {
    if let Some(pattern) = contains_injection_pattern(reasoning) {
        warn!(pattern, "Potential prompt injection in reasoning, discarding it");
        return "Selected by completion service".into();
    }
    if reasoning.chars().count() > MAX_REASONING_LENGTH {
        return reasoning.chars().take(MAX_REASONING_LENGTH).collect::<String>() + "...";
    }
    reasoning.to_string()
}

/// Reject input that should not be forwarded to the completion service.
pub fn validate_input_content(content: &str) -> Result<()> {
    if content.len() > MAX_INPUT_CONTENT_LENGTH {
        return Err(AgoraError::ExternalService(format!(
            "Input content exceeds maximum length of {MAX_INPUT_CONTENT_LENGTH} bytes"
        )));
    }
    if content.contains(r#""agent":"#) && content.contains(r#""confidence":"#) {
        warn!("Input content contains selection JSON - potential injection attempt");
    }
    Ok(())
}

/// Parse and validate a completion answer against the allowed agent ids.
pub fn parse_choice(response: &str, whitelist: &[String]) -> Result<TraditionalChoice> {
    let json_str = extract_json_object(response).ok_or_else(|| {
        AgoraError::ExternalService(format!(
            "No valid JSON found in response: {}",
            response.chars().take(200).collect::<String>()
        ))
    })?;

    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AgoraError::ExternalService(format!("Invalid JSON: {e}")))?;

    let agent_id = parsed
        .get("agent")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AgoraError::ExternalService("Response names no agent".into()))?;
    if !whitelist.iter().any(|id| id == agent_id) {
        warn!(agent = agent_id, "Completion chose an unregistered agent");
        return Err(AgoraError::ExternalService(format!(
            "Completion chose unregistered agent '{agent_id}'"
        )));
    }

    let confidence = parsed
        .get("confidence")
        .and_then(|v| v.as_f64())
        .map(validate_confidence)
        .unwrap_or(0.5) as f32;

    let reasoning = sanitize_reasoning(
        parsed
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("No reasoning provided"),
    );

    let mut alternatives: Vec<String> = Vec::new();
    if let Some(list) = parsed.get("alternatives").and_then(|v| v.as_array()) {
        for alt in list.iter().filter_map(|v| v.as_str()) {
            let known = whitelist.iter().any(|id| id == alt);
            if known && alt != agent_id && !alternatives.iter().any(|a| a == alt) {
                alternatives.push(alt.to_string());
            }
        }
    }
    alternatives.truncate(MAX_ALTERNATIVES);

    Ok(TraditionalChoice {
        agent_id: agent_id.to_string(),
        confidence,
        reasoning,
        alternatives,
    })
}

/// Extract a JSON object from a string that may contain other text.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0;

    for (i, c) in s[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Asks the completion service to pick an agent.
pub struct TraditionalSelector {
    llm: Arc<dyn LlmClient>,
}

impl TraditionalSelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn select(
        &self,
        description: &str,
        analysis: &TaskAnalysis,
        agents: &[AgentProfile],
    ) -> Result<TraditionalChoice> {
        validate_input_content(description)?;
        if agents.is_empty() {
            return Err(AgoraError::NoCandidate("no agents registered".into()));
        }

        let listing: Vec<String> = agents
            .iter()
            .map(|a| {
                format!(
                    "- {}: {}{}",
                    a.id,
                    a.description,
                    if a.can_execute { " (can execute)" } else { "" }
                )
            })
            .collect();
        let prompt = format!(
            "Agents:\n{}\n\nTask category: {}\nTask: {}",
            listing.join("\n"),
            analysis.category,
            description
        );

        debug!(
            content_preview = %description.chars().take(50).collect::<String>(),
            "Requesting completion-based selection"
        );

        let response = self
            .llm
            .complete(
                LlmRequest::prompt(SELECTION_SYSTEM_PROMPT, prompt)
                    .with_temperature(0.3)
                    .with_max_tokens(300),
            )
            .await?;

        let whitelist: Vec<String> = agents.iter().map(|a| a.id.clone()).collect();
        let choice = parse_choice(&response.content, &whitelist)?;

        info!(
            agent = %choice.agent_id,
            confidence = choice.confidence,
            "Completion-based selection"
        );
        Ok(choice)
    }
}
