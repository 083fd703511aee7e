//! Code generation agent - smart contracts and integration code.

use std::sync::Arc;

use agora_common::{
    Agent, AgentDescriptor, ExecutionOutcome, Result, SelfAssessment, TaskPriority, TaskRequirement,
};
use agora_llm::LlmClient;
use async_trait::async_trait;

use crate::specialist::{complete_task, is_consultation};

const CODEGEN_SYSTEM_PROMPT: &str = r#"You are a senior engineer who writes smart contracts and integration code. Your role is to:

1. Produce complete, compilable code for the task
2. Follow the relevant standard (ERC20, ERC721, ERC1155) exactly
3. Point out security pitfalls: reentrancy, overflow, access control
4. Keep the code minimal and explain non-obvious decisions briefly
"#;

pub fn default_descriptor(id: impl Into<String>) -> AgentDescriptor {
    AgentDescriptor {
        id: id.into(),
        name: "Code Generation Agent".into(),
        description: "Writes and reviews smart contracts and application code.".into(),
        keywords: vec![
            "code".into(),
            "contract".into(),
            "solidity".into(),
            "function".into(),
            "script".into(),
        ],
        capabilities: vec![
            "code_generation".into(),
            "smart_contract_development".into(),
            "code_review".into(),
        ],
        specializations: vec!["solidity".into(), "rust".into(), "typescript".into()],
        use_cases: vec![
            "Write a Solidity contract".into(),
            "Review contract code for vulnerabilities".into(),
        ],
        can_execute: false,
    }
}

pub struct CodeGenAgent {
    descriptor: AgentDescriptor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl CodeGenAgent {
    pub fn new(descriptor: AgentDescriptor, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { descriptor, llm }
    }

    pub fn with_default_config(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self::new(default_descriptor("code-agent"), llm)
    }
}

#[async_trait]
impl Agent for CodeGenAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, requirement: &TaskRequirement) -> Result<ExecutionOutcome> {
        complete_task(
            &self.descriptor,
            self.llm.as_ref(),
            CODEGEN_SYSTEM_PROMPT,
            requirement,
            0.8,
        )
        .await
    }

    async fn assess(&self, requirement: &TaskRequirement) -> Result<Option<SelfAssessment>> {
        if is_consultation(requirement) {
            return Ok(Some(SelfAssessment::new(0.2, 30.0, "code review only")));
        }
        // Rushed work gets a second review pass.
        let (cost, time) = match requirement.priority {
            TaskPriority::High => (0.45, 60.0),
            _ => (0.35, 75.0),
        };
        Ok(Some(SelfAssessment::new(cost, time, "write and self-review")))
    }
}
