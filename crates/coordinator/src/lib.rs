//! Task routing and agent negotiation for Agora.
//!
//! The router is the central brain that:
//! 1. Classifies incoming task descriptions
//! 2. Picks an agent by semantic similarity, falling back to completion-based
//!    selection, capability scoring and finally a default agent
//! 3. Runs bounded bidding rounds when one agent delegates to another
//! 4. Executes a primary agent with consultants and merges their output
//!
//! # Architecture
//!
//! ```text
//!  description / TaskRequirement
//!             │
//!             ▼
//!     ┌───────────────┐
//!     │  TaskRouter   │ ◄── RouterContext (catalog, registry, history)
//!     └───────┬───────┘
//!   ┌─────────┼──────────────┬──────────────────┐
//!   ▼         ▼              ▼                  ▼
//! [Semantic] [Capability] [Negotiation]   [Collaboration]
//!  Matcher    Scorer       Coordinator     Synthesizer
//! ```

pub mod catalog;
pub mod config;
pub mod context;
pub mod history;
pub mod negotiation;
pub mod registry;
pub mod router;
pub mod routing;
pub mod scorer;
pub mod semantic;
pub mod synthesis;
pub mod traditional;

pub use catalog::{AgentProfile, Capability, CapabilityCatalog, PerformanceMetrics};
pub use config::{
    AgentConfig, HistoryConfig, MatchingConfig, NegotiationConfig, RouterConfig, TieBreakRule,
};
pub use context::RouterContext;
pub use negotiation::{
    Bid, Consultation, Negotiation, NegotiationCoordinator, NegotiationRound, NegotiationState,
    evaluate_bids,
};
pub use registry::AgentRegistry;
pub use router::{TaskRouter, classify, extract_context_tags};
pub use routing::{
    CandidateMatch, Complexity, MatchType, SelectionPath, SelectionResult, TaskAnalysis, TaskDomain,
};
pub use scorer::CapabilityScorer;
pub use semantic::{
    SemanticMatch, SemanticMatcher, SemanticRequest, SemanticSelection, profile_text,
};
pub use synthesis::{CollaborationSynthesizer, CollaborativeResult, Contribution, ContributionRole};
pub use traditional::{TraditionalChoice, TraditionalSelector};
