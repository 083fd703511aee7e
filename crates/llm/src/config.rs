use std::sync::Arc;

use async_trait::async_trait;
use agora_common::{AgoraError, Result};
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::embedding::EmbeddingClient;
use crate::hashing::HashingEmbedder;
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint) or "hashing" (offline
    /// embeddings only, no completion service)
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".into(),
            model: "hashing".into(),
            embedding_model: None,
            api_key: None,
            api_url: None,
            temperature: None,
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from config or `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        match self.api_key {
            Some(ref key) if !key.is_empty() => Some(key.clone()),
            _ if self.provider == "openai" => std::env::var("OPENAI_API_KEY").ok(),
            _ => None,
        }
    }
}

/// Bounds the number of in-flight calls to the wrapped collaborator.
pub struct SemaphoredClient<T: ?Sized> {
    inner: Arc<T>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl<T: ?Sized> SemaphoredClient<T> {
    pub fn new(inner: Arc<T>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }

    async fn permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|e| AgoraError::ExternalService(format!("Semaphore acquire failed: {e}")))
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for SemaphoredClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self.permit().await?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[async_trait]
impl<T: EmbeddingClient + ?Sized> EmbeddingClient for SemaphoredClient<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self.permit().await?;
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _permit = self.permit().await?;
        self.inner.embed_batch(texts).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

fn openai_client(config: &LlmConfig) -> OpenAiClient {
    let client = OpenAiClient::new(
        config.api_url.clone(),
        config.model.clone(),
        config.resolve_api_key(),
    );
    match config.embedding_model {
        Some(ref model) => client.with_embedding_model(model.clone()),
        None => client,
    }
}

/// Build the completion collaborator. `Ok(None)` for providers that only
/// embed.
pub fn build_llm_client(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>> {
    match config.provider.as_str() {
        "openai" => {
            let retrying = RetryingClient::new(openai_client(config), config.retry.clone());
            let inner: Arc<dyn LlmClient> = Arc::new(retrying);
            Ok(Some(Arc::new(SemaphoredClient::new(
                inner,
                config.max_concurrent_requests,
            ))))
        }
        "hashing" => Ok(None),
        other => Err(AgoraError::Config(format!("Unknown LLM provider: {other}"))),
    }
}

/// Build the embedding collaborator.
pub fn build_embedding_client(config: &LlmConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => {
            let retrying = RetryingClient::new(openai_client(config), config.retry.clone());
            let inner: Arc<dyn EmbeddingClient> = Arc::new(retrying);
            Ok(Arc::new(SemaphoredClient::new(
                inner,
                config.max_concurrent_requests,
            )))
        }
        "hashing" => Ok(Arc::new(HashingEmbedder::default())),
        other => Err(AgoraError::Config(format!("Unknown LLM provider: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "openai"
model = "llama3"
embedding_model = "nomic-embed-text"
api_url = "http://localhost:11434"
max_concurrent_requests = 8

[retry]
max_retries = 5
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 3.0
"#;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.embedding_model.as_deref(), Some("nomic-embed-text"));
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn deserialize_config_defaults() {
        let config: LlmConfig =
            toml::from_str("provider = \"hashing\"\nmodel = \"none\"\n").unwrap();
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.embedding_model.is_none());
    }

    #[test]
    fn build_openai_clients() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            model: "llama3".to_string(),
            embedding_model: Some("nomic-embed-text".to_string()),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let llm = build_llm_client(&config).unwrap().unwrap();
        assert_eq!(llm.model_name(), "llama3");
        let embedder = build_embedding_client(&config).unwrap();
        assert_eq!(embedder.model_name(), "nomic-embed-text");
    }

    #[test]
    fn hashing_provider_has_no_completion() {
        let config = LlmConfig::default();
        assert!(build_llm_client(&config).unwrap().is_none());
        assert_eq!(build_embedding_client(&config).unwrap().model_name(), "hashing");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_llm_client(&config), Err(AgoraError::Config(_))));
        assert!(build_embedding_client(&config).is_err());
    }

    #[test]
    fn explicit_api_key_wins() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key: Some("sk-explicit".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-explicit"));
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use crate::client::LlmResponse;
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let inner = Arc::new(CountingClient {
            concurrent: concurrent.clone(),
            max_seen: max_seen.clone(),
        });

        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
