//! OpenAI-compatible HTTP adapter (OpenAI, Ollama, vLLM, ...).
//!
//! One client serves both collaborators: chat completions for reasoning
//! strings and the `/v1/embeddings` endpoint for semantic matching.

use async_trait::async_trait;
use agora_common::{AgoraError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
use crate::embedding::EmbeddingClient;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    model: String,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

pub struct OpenAiClient {
    base_url: String,
    model: String,
    embedding_model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn role_to_string(role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn build_messages(request: &LlmRequest) -> Vec<WireMessage> {
        let system = request.system_prompt.iter().map(|s| WireMessage {
            role: "system".to_string(),
            content: s.clone(),
        });
        let rest = request.messages.iter().map(|m| WireMessage {
            role: Self::role_to_string(&m.role).to_string(),
            content: m.content.clone(),
        });
        system.chain(rest).collect()
    }

    fn build_chat_body(&self, request: &LlmRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: Self::build_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let mut http_req = self.http_client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| AgoraError::ExternalService(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(", Retry-After: {v}"))
                .unwrap_or_default();
            let body_text = response.text().await.unwrap_or_default();
            return Err(AgoraError::ExternalService(format!(
                "API error {status}{retry_after}: {body_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| {
                AgoraError::ExternalService(format!("failed to parse {path} response: {e}"))
            })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = self.build_chat_body(&request);
        let response: ChatResponse = self.post("/v1/chat/completions", &body).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                AgoraError::ExternalService("no choices in completion response".into())
            })?;

        Ok(LlmResponse {
            content: choice.message.content,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| AgoraError::ExternalService("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts.iter().map(String::as_str).collect(),
        };
        let response: EmbeddingResponse = self.post("/v1/embeddings", &body).await?;
        if response.data.len() != texts.len() {
            return Err(AgoraError::ExternalService(format!(
                "embedding response had {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        debug!(
            batch_size = data.len(),
            dimension = data.first().map(|d| d.embedding.len()).unwrap_or(0),
            "Received embeddings"
        );
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatMessage;

    #[test]
    fn chat_body_matches_openai_format() {
        let client =
            OpenAiClient::new(None, "gpt-4o-mini".to_string(), Some("sk-test".to_string()));
        let request = LlmRequest {
            system_prompt: Some("Explain agent choices.".to_string()),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Why blockchain-agent?".to_string(),
            }],
            temperature: Some(0.5),
            max_tokens: Some(128),
        };

        let json = serde_json::to_value(client.build_chat_body(&request)).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["max_tokens"], 128);

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Why blockchain-agent?");
    }

    #[test]
    fn chat_body_omits_unset_fields() {
        let client = OpenAiClient::new(None, "llama3".to_string(), None);
        let request = LlmRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Hello".to_string(),
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(client.build_chat_body(&request)).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn embedding_body_lists_inputs() {
        let body = EmbeddingRequest {
            model: "nomic-embed-text",
            input: vec!["a", "b"],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn base_url_defaults_and_trims() {
        let client = OpenAiClient::new(None, "llama3".to_string(), None);
        assert_eq!(client.base_url, "http://localhost:11434");
        let client = OpenAiClient::new(Some("https://api.openai.com/".into()), "gpt".into(), None)
            .with_embedding_model("text-embedding-3-small");
        assert_eq!(client.base_url, "https://api.openai.com");
        assert_eq!(EmbeddingClient::model_name(&client), "text-embedding-3-small");
        assert_eq!(LlmClient::model_name(&client), "gpt");
    }

    #[tokio::test]
    async fn empty_batch_skips_network() {
        let client = OpenAiClient::new(Some("http://127.0.0.1:1".into()), "m".into(), None);
        let out = client.embed_batch(&[]).await.unwrap();
        assert!(out.is_empty());
    }
}
