//! Built-in specialist agents.
//!
//! Each agent owns a profile (capabilities, specializations, keywords), a
//! system prompt and a cost model used when it bids on a task:
//!
//! - **Blockchain Agent**: token deployment, transfers, NFT minting, DeFi
//! - **Research Agent**: market research and on-chain analytics
//! - **Code Generation Agent**: smart contracts and integration code
//! - **Companion Agent**: conversation with no task to execute
//! - **Orchestrator Agent**: multi-step planning
//!
//! ```text
//! ┌────────────┐ ┌──────────┐ ┌─────────┐ ┌───────────┐ ┌──────────────┐
//! │ Blockchain │ │ Research │ │ CodeGen │ │ Companion │ │ Orchestrator │
//! └─────┬──────┘ └────┬─────┘ └────┬────┘ └─────┬─────┘ └──────┬───────┘
//!       └─────────────┴──────┬─────┴────────────┴──────────────┘
//!                            ▼
//!                 specialist::complete_task
//!                            ▼
//!                    LlmClient (optional)
//! ```

pub mod blockchain;
pub mod codegen;
pub mod companion;
pub mod kind;
pub mod orchestrator;
pub mod research;
pub mod specialist;

pub use blockchain::BlockchainAgent;
pub use codegen::CodeGenAgent;
pub use companion::CompanionAgent;
pub use kind::{AgentKind, build_agent};
pub use orchestrator::OrchestratorAgent;
pub use research::ResearchAgent;
