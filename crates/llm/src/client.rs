use async_trait::async_trait;
use agora_common::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Single-turn request: one system prompt, one user message.
    pub fn prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system.into()),
            messages: vec![ChatMessage {
                role: Role::User,
                content: user.into(),
            }],
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// Whether the model stopped on its own rather than hitting a limit.
    pub fn finished_cleanly(&self) -> bool {
        matches!(self.finish_reason.as_deref(), None | Some("stop") | Some("end_turn"))
    }
}

/// Text completion collaborator.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
    fn model_name(&self) -> &str;
}

#[async_trait]
impl LlmClient for Box<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builds_system_and_user() {
        let request = LlmRequest::prompt("You route tasks.", "Mint an NFT").with_max_tokens(64);
        assert_eq!(request.system_prompt.as_deref(), Some("You route tasks."));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "Mint an NFT");
        assert_eq!(request.max_tokens, Some(64));
        assert!(request.temperature.is_none());
    }

    #[test]
    fn finished_cleanly_checks_finish_reason() {
        let mut response = LlmResponse {
            content: "ok".to_string(),
            model: "m".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        };
        assert!(response.finished_cleanly());
        response.finish_reason = Some("length".to_string());
        assert!(!response.finished_cleanly());
        response.finish_reason = None;
        assert!(response.finished_cleanly());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
