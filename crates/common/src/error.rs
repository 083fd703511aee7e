//! Error types for Agora.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgoraError {
    /// No registered agent can satisfy the task. Fatal for the call.
    #[error("No candidate agents for task: {0}")]
    NoCandidate(String),

    /// The embedding or completion service failed. Callers degrade instead of
    /// surfacing this.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Agent '{agent_id}' failed: {message}")]
    ExecutionFailed { agent_id: String, message: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgoraError {
    pub fn execution(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            agent_id: agent_id.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCandidate(_) => "NO_CANDIDATE",
            Self::ExternalService(_) => "EXTERNAL_SERVICE",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
            Self::UnknownAgent(_) => "UNKNOWN_AGENT",
            Self::Config(_) => "CONFIGURATION",
            Self::Io(_) => "IO",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgoraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_formats_agent_and_message() {
        let err = AgoraError::execution("blockchain-agent", "rpc timeout");
        assert_eq!(err.to_string(), "Agent 'blockchain-agent' failed: rpc timeout");
        assert_eq!(err.code(), "EXECUTION_FAILED");
    }

    #[test]
    fn serde_errors_convert() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: AgoraError = parse.unwrap_err().into();
        assert!(matches!(err, AgoraError::Serialization(_)));
    }
}
