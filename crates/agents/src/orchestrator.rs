//! Orchestrator agent - breaks multi-step tasks into agent-sized pieces.

use std::sync::Arc;

use agora_common::{
    Agent, AgentDescriptor, ExecutionOutcome, Result, SelfAssessment, TaskRequirement,
};
use agora_llm::LlmClient;
use async_trait::async_trait;

use crate::specialist::complete_task;

const ORCHESTRATOR_SYSTEM_PROMPT: &str = r#"You are a task orchestrator for a multi-agent system. Your role is to:

1. Break the task into ordered steps
2. Name the capability each step needs (blockchain_operations, research_analysis, code_generation, companion_chat)
3. Mark which steps can run in parallel
4. Keep the plan short: one line per step
"#;

pub fn default_descriptor(id: impl Into<String>) -> AgentDescriptor {
    AgentDescriptor {
        id: id.into(),
        name: "Orchestrator Agent".into(),
        description: "Plans multi-step tasks and coordinates other agents.".into(),
        keywords: vec![
            "plan".into(),
            "workflow".into(),
            "steps".into(),
            "coordinate".into(),
            "orchestrate".into(),
        ],
        capabilities: vec![
            "task_orchestration".into(),
            "workflow_planning".into(),
            "task_decomposition".into(),
        ],
        specializations: vec!["multi_agent_coordination".into()],
        use_cases: vec!["Plan a token launch end to end".into()],
        can_execute: false,
    }
}

pub struct OrchestratorAgent {
    descriptor: AgentDescriptor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl OrchestratorAgent {
    pub fn new(descriptor: AgentDescriptor, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { descriptor, llm }
    }

    pub fn with_default_config(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self::new(default_descriptor("orchestrator-agent"), llm)
    }
}

#[async_trait]
impl Agent for OrchestratorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, requirement: &TaskRequirement) -> Result<ExecutionOutcome> {
        complete_task(
            &self.descriptor,
            self.llm.as_ref(),
            ORCHESTRATOR_SYSTEM_PROMPT,
            requirement,
            0.7,
        )
        .await
    }

    async fn assess(&self, requirement: &TaskRequirement) -> Result<Option<SelfAssessment>> {
        let steps = requirement.required_capabilities.len().max(1) as f32;
        Ok(Some(SelfAssessment::new(
            0.2 + 0.05 * steps,
            20.0 + 20.0 * steps,
            format!("plan with about {} step(s)", steps as usize),
        )))
    }
}
