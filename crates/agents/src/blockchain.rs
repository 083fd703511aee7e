//! Blockchain agent - token deployment, transfers, NFT minting, DeFi calls.
//!
//! The only built-in agent that can carry out state-changing operations.
//! Chain interaction itself lives behind the completion backend; this type
//! owns the profile, the prompt and the cost model.

use std::sync::Arc;

use agora_common::{
    Agent, AgentDescriptor, ExecutionOutcome, Result, SecurityLevel, SelfAssessment,
    TaskRequirement,
};
use agora_llm::LlmClient;
use async_trait::async_trait;

use crate::specialist::{complete_task, is_consultation};

const BLOCKCHAIN_SYSTEM_PROMPT: &str = r#"You are a blockchain execution agent. Your role is to:

1. Turn the task into a concrete on-chain execution plan
2. Name the target network, contract standard and every transaction needed
3. Flag irreversible steps and anything that moves funds
4. Estimate gas and call out missing parameters (addresses, amounts, decimals)

Never invent addresses or private keys.
Prefer testnets unless the task names a mainnet explicitly.
"#;

/// Networks that cost real money to transact on.
const MAINNETS: &[&str] = &["ethereum", "mainnet", "arbitrum", "optimism", "base", "polygon"];

pub fn default_descriptor(id: impl Into<String>) -> AgentDescriptor {
    AgentDescriptor {
        id: id.into(),
        name: "Blockchain Agent".into(),
        description: "Executes on-chain operations: token deployment, transfers, NFT minting, \
                      wallet management and DeFi interactions."
            .into(),
        keywords: vec![
            "blockchain".into(),
            "token".into(),
            "wallet".into(),
            "transfer".into(),
            "deploy".into(),
            "mint".into(),
            "swap".into(),
        ],
        capabilities: vec![
            "blockchain_operations".into(),
            "erc20_deployment".into(),
            "nft_minting".into(),
            "token_transfer".into(),
            "wallet_management".into(),
            "defi_operations".into(),
            "smart_contract_deployment".into(),
        ],
        specializations: vec![
            "erc20".into(),
            "erc721".into(),
            "token_deployment".into(),
            "ethereum".into(),
        ],
        use_cases: vec![
            "Deploy an ERC20 token".into(),
            "Mint an NFT collection".into(),
            "Transfer tokens between wallets".into(),
        ],
        can_execute: true,
    }
}

pub struct BlockchainAgent {
    descriptor: AgentDescriptor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl BlockchainAgent {
    pub fn new(descriptor: AgentDescriptor, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { descriptor, llm }
    }

    pub fn with_default_config(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self::new(default_descriptor("blockchain-agent"), llm)
    }

    fn estimate(requirement: &TaskRequirement) -> SelfAssessment {
        let mut cost: f32 = 0.3;
        let mut time: f32 = 30.0;
        let mut notes = Vec::new();

        match requirement.security_level {
            SecurityLevel::Low => {}
            SecurityLevel::Medium => cost += 0.1,
            SecurityLevel::High => {
                cost += 0.25;
                time += 30.0;
                notes.push("extra confirmation for high-security task");
            }
        }

        let category = requirement.category.to_lowercase();
        if category.contains("deploy") || category.contains("mint") {
            time += 30.0;
            notes.push("contract deployment or mint needs block confirmations");
        }

        let on_mainnet = requirement
            .context
            .get("network")
            .map(|n| MAINNETS.contains(&n.to_lowercase().as_str()))
            .unwrap_or(false);
        if on_mainnet {
            cost += 0.15;
            notes.push("mainnet gas");
        }

        if is_consultation(requirement) {
            cost *= 0.5;
            time *= 0.5;
        }

        let reasoning = if notes.is_empty() {
            "Standard on-chain operation".to_string()
        } else {
            notes.join("; ")
        };
        SelfAssessment::new(cost, time, reasoning)
    }
}

#[async_trait]
impl Agent for BlockchainAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, requirement: &TaskRequirement) -> Result<ExecutionOutcome> {
        complete_task(
            &self.descriptor,
            self.llm.as_ref(),
            BLOCKCHAIN_SYSTEM_PROMPT,
            requirement,
            0.85,
        )
        .await
    }

    async fn assess(&self, requirement: &TaskRequirement) -> Result<Option<SelfAssessment>> {
        Ok(Some(Self::estimate(requirement)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_descriptor_can_execute() {
        let agent = BlockchainAgent::with_default_config(None);
        assert_eq!(agent.id(), "blockchain-agent");
        assert!(agent.descriptor().can_execute);
        assert!(agent.capabilities().contains(&"erc20_deployment".to_string()));
    }

    #[tokio::test]
    async fn mainnet_high_security_costs_more() {
        let agent = BlockchainAgent::with_default_config(None);
        let cheap = TaskRequirement::new("token_transfer").with_context("network", "sepolia");
        let pricey = TaskRequirement::new("erc20_deployment")
            .with_security_level(SecurityLevel::High)
            .with_context("network", "Ethereum");

        let cheap = agent.assess(&cheap).await.unwrap().unwrap();
        let pricey = agent.assess(&pricey).await.unwrap().unwrap();

        assert!((cheap.estimated_cost - 0.3).abs() < 1e-6);
        assert!((cheap.estimated_time_sec - 30.0).abs() < 1e-6);
        assert!((pricey.estimated_cost - 0.7).abs() < 1e-6);
        assert!((pricey.estimated_time_sec - 90.0).abs() < 1e-6);
        assert!(pricey.reasoning.contains("mainnet"));
    }

    #[tokio::test]
    async fn consultation_is_discounted() {
        let agent = BlockchainAgent::with_default_config(None);
        let req = TaskRequirement::new("token_transfer").consultation();
        let estimate = agent.assess(&req).await.unwrap().unwrap();
        assert!((estimate.estimated_cost - 0.15).abs() < 1e-6);
        assert!((estimate.estimated_time_sec - 15.0).abs() < 1e-6);
    }
}
