//! Shared execution path for completion-backed agents.

use std::sync::Arc;

use agora_common::{AgentDescriptor, AgoraError, ExecutionOutcome, Result, TaskRequirement};
use agora_llm::{LlmClient, LlmRequest};
use tracing::{debug, info, warn};

/// Confidence multiplier when the model was cut off mid-answer.
const TRUNCATED_PENALTY: f32 = 0.7;

/// Render a requirement as the user turn of a completion request.
pub fn render_task(requirement: &TaskRequirement) -> String {
    let mut out = format!(
        "Task category: {}\nPriority: {:?}\nSecurity level: {:?}\n",
        requirement.category, requirement.priority, requirement.security_level
    );
    if !requirement.required_capabilities.is_empty() {
        let caps: Vec<&str> = requirement
            .required_capabilities
            .iter()
            .map(String::as_str)
            .collect();
        out.push_str(&format!("Required capabilities: {}\n", caps.join(", ")));
    }
    if !requirement.description.is_empty() {
        out.push_str(&format!("Description: {}\n", requirement.description));
    }
    let mut context: Vec<_> = requirement.context.iter().collect();
    context.sort();
    for (k, v) in context {
        out.push_str(&format!("Context {k}: {v}\n"));
    }
    out
}

/// Run a task through the agent's completion client.
pub async fn complete_task(
    descriptor: &AgentDescriptor,
    llm: Option<&Arc<dyn LlmClient>>,
    system_prompt: &str,
    requirement: &TaskRequirement,
    base_confidence: f32,
) -> Result<ExecutionOutcome> {
    let llm = llm.ok_or_else(|| {
        AgoraError::execution(&descriptor.id, "no completion backend configured")
    })?;

    info!(
        agent = %descriptor.id,
        category = %requirement.category,
        "Executing task"
    );

    let request = LlmRequest::prompt(system_prompt, render_task(requirement));
    let response = llm.complete(request).await.map_err(|e| {
        warn!(agent = %descriptor.id, error = %e, "Completion failed");
        AgoraError::execution(&descriptor.id, e.to_string())
    })?;

    let confidence = if response.finished_cleanly() {
        base_confidence
    } else {
        base_confidence * TRUNCATED_PENALTY
    };

    debug!(
        agent = %descriptor.id,
        model = %response.model,
        confidence,
        "Task completed"
    );

    Ok(ExecutionOutcome::new(
        serde_json::json!({
            "agent": descriptor.id,
            "category": requirement.category,
            "output": response.content,
            "model": response.model,
        }),
        confidence,
    ))
}

/// Whether the requirement is a consultation on another agent's task.
pub fn is_consultation(requirement: &TaskRequirement) -> bool {
    requirement.category.starts_with("consult_on_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::{SecurityLevel, TaskPriority};

    #[test]
    fn render_task_includes_sorted_context() {
        let req = TaskRequirement::new("token_transfer")
            .with_priority(TaskPriority::High)
            .with_security_level(SecurityLevel::High)
            .require("blockchain_operations")
            .with_description("Send 5 USDC")
            .with_context("network", "polygon")
            .with_context("amount", "5");

        let text = render_task(&req);
        assert!(text.starts_with("Task category: token_transfer\nPriority: High\nSecurity level: High\n"));
        assert!(text.contains("Required capabilities: blockchain_operations"));
        assert!(text.contains("Description: Send 5 USDC"));
        let amount = text.find("Context amount: 5").unwrap();
        let network = text.find("Context network: polygon").unwrap();
        assert!(amount < network);
    }

    #[tokio::test]
    async fn missing_backend_is_execution_failure() {
        let descriptor = AgentDescriptor {
            id: "x".into(),
            ..Default::default()
        };
        let err = complete_task(&descriptor, None, "sys", &TaskRequirement::new("c"), 0.8)
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::ExecutionFailed { ref agent_id, .. } if agent_id == "x"));
    }

    #[test]
    fn consultation_detection() {
        assert!(is_consultation(&TaskRequirement::new("nft").consultation()));
        assert!(!is_consultation(&TaskRequirement::new("nft")));
    }
}
