//! Bearer-token authentication.
//!
//! Enabled only when the server is started with an API key. `/health` is
//! always reachable so load balancers can probe without credentials.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

use crate::routes::ErrorResponse;
use crate::state::AppState;

/// Paths reachable without a key.
const PUBLIC_PATHS: &[&str] = &["/health"];

/// The key clients must present.
#[derive(Clone)]
pub struct ApiKey {
    bytes: Vec<u8>,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            bytes: key.into().into_bytes(),
        }
    }

    /// Constant-time comparison.
    pub fn matches(&self, provided: &[u8]) -> bool {
        if self.bytes.len() != provided.len() {
            return false;
        }
        self.bytes
            .iter()
            .zip(provided)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized(error: &str, code: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            code,
        }),
    )
        .into_response()
}

/// Reject requests without the configured bearer token.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(key) = state.api_key.as_ref() else {
        return next.run(request).await;
    };
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match bearer_token(request.headers()) {
        Some(token) if key.matches(token.as_bytes()) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Invalid API key provided");
            unauthorized("Invalid API key", "INVALID_API_KEY")
        }
        None => {
            warn!(path = %request.uri().path(), "Missing Authorization header");
            unauthorized(
                "Missing or invalid Authorization header. Use: Authorization: Bearer <key>",
                "MISSING_API_KEY",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_matches() {
        let key = ApiKey::new("agora-key-123");
        assert!(key.matches(b"agora-key-123"));
        assert!(!key.matches(b"agora-key-124"));
        assert!(!key.matches(b""));
        assert!(!key.matches(b"agora-key-123-longer"));
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("secret");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Bearer my-secret-key".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("my-secret-key"));

        headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
