//! Research agent - market research, on-chain analytics, knowledge gathering.

use std::sync::Arc;

use agora_common::{
    Agent, AgentDescriptor, ExecutionOutcome, Result, SelfAssessment, TaskRequirement,
};
use agora_llm::LlmClient;
use async_trait::async_trait;

use crate::specialist::{complete_task, is_consultation};

const RESEARCH_SYSTEM_PROMPT: &str = r#"You are a research assistant specialized in gathering and synthesizing information. Your role is to:

1. Understand research queries and identify key topics
2. Summarize market, protocol and on-chain data relevant to the task
3. Synthesize information into clear findings
4. Identify gaps in knowledge and suggest follow-up research

Always prioritize accuracy over speed.
Distinguish between facts and opinions.
"#;

pub fn default_descriptor(id: impl Into<String>) -> AgentDescriptor {
    AgentDescriptor {
        id: id.into(),
        name: "Research Agent".into(),
        description: "Researches markets, protocols and on-chain data and produces analysis reports."
            .into(),
        keywords: vec![
            "research".into(),
            "analysis".into(),
            "market".into(),
            "price".into(),
            "balance".into(),
            "report".into(),
        ],
        capabilities: vec![
            "research_analysis".into(),
            "market_analysis".into(),
            "blockchain_query".into(),
            "data_analysis".into(),
        ],
        specializations: vec!["market_research".into(), "onchain_analytics".into()],
        use_cases: vec![
            "Analyze a token's market performance".into(),
            "Look up a wallet balance".into(),
            "Compare DeFi yields".into(),
        ],
        can_execute: false,
    }
}

pub struct ResearchAgent {
    descriptor: AgentDescriptor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl ResearchAgent {
    pub fn new(descriptor: AgentDescriptor, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { descriptor, llm }
    }

    pub fn with_default_config(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self::new(default_descriptor("research-agent"), llm)
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, requirement: &TaskRequirement) -> Result<ExecutionOutcome> {
        complete_task(
            &self.descriptor,
            self.llm.as_ref(),
            RESEARCH_SYSTEM_PROMPT,
            requirement,
            0.75,
        )
        .await
    }

    async fn assess(&self, requirement: &TaskRequirement) -> Result<Option<SelfAssessment>> {
        let topics = requirement.required_capabilities.len().max(1) as f32;
        let time = if is_consultation(requirement) {
            20.0
        } else {
            30.0 + 15.0 * topics
        };
        Ok(Some(SelfAssessment::new(
            0.2,
            time,
            format!("{} research topic(s)", topics as usize),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn time_scales_with_topics() {
        let agent = ResearchAgent::with_default_config(None);
        let one = agent
            .assess(&TaskRequirement::new("research"))
            .await
            .unwrap()
            .unwrap();
        let three = agent
            .assess(
                &TaskRequirement::new("research")
                    .require("market_analysis")
                    .require("data_analysis")
                    .require("blockchain_query"),
            )
            .await
            .unwrap()
            .unwrap();
        assert!((one.estimated_time_sec - 45.0).abs() < 1e-6);
        assert!((three.estimated_time_sec - 75.0).abs() < 1e-6);
        assert!(!agent.descriptor().can_execute);
    }
}
