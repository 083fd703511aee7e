use agora_common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::embedding::EmbeddingClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retries transient failures (rate limits, 5xx) of the wrapped collaborator.
pub struct RetryingClient<T> {
    inner: T,
    config: RetryConfig,
}

impl<T> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn is_retryable(error_msg: &str) -> bool {
        let lower = error_msg.to_lowercase();
        [
            "429",
            "rate limit",
            "500",
            "502",
            "503",
            "504",
            "server error",
            "bad gateway",
            "service unavailable",
            "gateway timeout",
        ]
        .iter()
        .any(|needle| lower.contains(needle))
    }

    fn parse_retry_after(error_msg: &str) -> Option<u64> {
        let lower = error_msg.to_lowercase();
        let pos = lower.find("retry-after")?;
        error_msg[pos..]
            .split_whitespace()
            .skip(1)
            .find_map(|word| {
                word.trim_end_matches(|c: char| !c.is_ascii_digit())
                    .parse::<u64>()
                    .ok()
            })
            .map(|secs| secs * 1000)
    }

    fn compute_delay(&self, attempt: u32) -> u64 {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let jitter = (base * 0.1 * rand_jitter(attempt)) as u64;
        let delay = (base as u64).saturating_add(jitter);
        delay.min(self.config.max_delay_ms)
    }

    async fn with_retries<R, F, Fut>(&self, operation: &str, mut call: F) -> Result<R>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R>> + Send,
        R: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let error_msg = e.to_string();
                    if attempt >= self.config.max_retries || !Self::is_retryable(&error_msg) {
                        return Err(e);
                    }

                    let delay = Self::parse_retry_after(&error_msg)
                        .unwrap_or_else(|| self.compute_delay(attempt))
                        .min(self.config.max_delay_ms);

                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay,
                        error = %error_msg,
                        "Retrying external call"
                    );

                    tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Deterministic jitter based on attempt number.
fn rand_jitter(attempt: u32) -> f64 {
    let x = attempt.wrapping_mul(2654435761);
    (x % 100) as f64 / 100.0
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.with_retries("complete", || self.inner.complete(request.clone()))
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[async_trait]
impl<T: EmbeddingClient> EmbeddingClient for RetryingClient<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.with_retries("embed", || self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.with_retries("embed_batch", || self.inner.embed_batch(texts))
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::AgoraError;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Probe = RetryingClient<()>;

    #[test]
    fn default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn retryable_error_detection() {
        assert!(Probe::is_retryable("API error 429 Too Many Requests: rate limit exceeded"));
        assert!(Probe::is_retryable("API error 503 Service Unavailable"));
        assert!(!Probe::is_retryable("API error 401 Unauthorized"));
        assert!(!Probe::is_retryable("failed to parse /v1/embeddings response"));
    }

    #[test]
    fn parse_retry_after_from_error() {
        let msg = "API error 429 Too Many Requests, Retry-After: 5: slow down";
        assert_eq!(Probe::parse_retry_after(msg), Some(5000));
        assert_eq!(Probe::parse_retry_after("API error 500"), None);
    }

    #[test]
    fn compute_delay_respects_max() {
        let client = RetryingClient::new(
            (),
            RetryConfig {
                max_retries: 5,
                initial_delay_ms: 500,
                max_delay_ms: 2000,
                backoff_multiplier: 10.0,
            },
        );
        assert!(client.compute_delay(5) <= 2000);
    }

    struct FlakyEmbedder {
        failures_left: AtomicU32,
        calls: AtomicU32,
        message: &'static str,
    }

    #[async_trait]
    impl EmbeddingClient for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(AgoraError::ExternalService(self.message.to_string()));
            }
            Ok(vec![1.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
        }
    }

    #[tokio::test]
    async fn transient_embedding_failures_are_retried() {
        let client = RetryingClient::new(
            FlakyEmbedder {
                failures_left: AtomicU32::new(2),
                calls: AtomicU32::new(0),
                message: "API error 503 Service Unavailable",
            },
            fast_config(),
        );
        let vector = client.embed("hello").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let client = RetryingClient::new(
            FlakyEmbedder {
                failures_left: AtomicU32::new(10),
                calls: AtomicU32::new(0),
                message: "API error 401 Unauthorized",
            },
            fast_config(),
        );
        assert!(client.embed("hello").await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }
}
