//! Companion agent - conversational requests with no task to execute.

use std::sync::Arc;

use agora_common::{
    Agent, AgentDescriptor, ExecutionOutcome, Result, SelfAssessment, TaskRequirement,
};
use agora_llm::LlmClient;
use async_trait::async_trait;

use crate::specialist::complete_task;

const COMPANION_SYSTEM_PROMPT: &str = r#"You are a friendly companion. Keep replies short, warm and personal.
If the user asks for something that needs an on-chain action or research, say which specialist will handle it instead of guessing.
"#;

pub fn default_descriptor(id: impl Into<String>) -> AgentDescriptor {
    AgentDescriptor {
        id: id.into(),
        name: "Companion Agent".into(),
        description: "Handles casual conversation, greetings and emotional support.".into(),
        keywords: vec![
            "chat".into(),
            "hello".into(),
            "talk".into(),
            "feel".into(),
            "friend".into(),
        ],
        capabilities: vec![
            "companion_chat".into(),
            "conversation".into(),
            "emotional_support".into(),
        ],
        specializations: vec!["personality".into(), "memory_recall".into()],
        use_cases: vec!["Chat about the day".into(), "Answer a greeting".into()],
        can_execute: false,
    }
}

pub struct CompanionAgent {
    descriptor: AgentDescriptor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl CompanionAgent {
    pub fn new(descriptor: AgentDescriptor, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { descriptor, llm }
    }

    pub fn with_default_config(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self::new(default_descriptor("companion-agent"), llm)
    }
}

#[async_trait]
impl Agent for CompanionAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, requirement: &TaskRequirement) -> Result<ExecutionOutcome> {
        complete_task(
            &self.descriptor,
            self.llm.as_ref(),
            COMPANION_SYSTEM_PROMPT,
            requirement,
            0.7,
        )
        .await
    }

    async fn assess(&self, _requirement: &TaskRequirement) -> Result<Option<SelfAssessment>> {
        Ok(Some(SelfAssessment::new(0.1, 5.0, "single conversational turn")))
    }
}
