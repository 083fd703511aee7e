//! Common types and traits shared across Agora crates.
//!
//! This crate provides the foundational abstractions that the router,
//! the negotiation layer and every agent use to communicate.

pub mod error;
pub mod task;
pub mod traits;

pub use error::{AgoraError, Result};
pub use task::{SecurityLevel, TaskPriority, TaskRequirement};
pub use traits::{Agent, AgentDescriptor, ExecutionOutcome, SelfAssessment};

/// Generate a fresh task id.
pub fn new_task_id() -> String {
    format!("task_{}", uuid::Uuid::new_v4())
}
