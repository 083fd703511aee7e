//! External collaborators used by the router: text completion for
//! reasoning strings and embeddings for semantic matching.

pub mod client;
pub mod config;
pub mod embedding;
pub mod hashing;
pub mod openai;
pub mod retry;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, SemaphoredClient, build_embedding_client, build_llm_client};
pub use embedding::{EmbeddingClient, cosine_similarity};
pub use hashing::HashingEmbedder;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
