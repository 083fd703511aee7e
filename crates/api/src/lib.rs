//! REST API gateway for Agora.
//!
//! Exposes the task router over HTTP.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/v1/agents` - Registered agent profiles
//! - `PUT /api/v1/agents/{id}/metrics` - Update load and success rate
//! - `POST /api/v1/route` - Choose an agent for a task description
//! - `POST /api/v1/delegate` - Negotiate a delegation
//! - `GET /api/v1/negotiations/{task_id}` - Look up a negotiation
//! - `POST /api/v1/collaborate` - Run a primary agent with consultants
//!
//! # Architecture
//!
//! ```text
//! Client
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Gateway   │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │   TaskRouter    │
//! └─────────────────┘
//! ```

pub mod auth;
pub mod routes;
pub mod state;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use auth::ApiKey;
pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/agents", get(routes::list_agents))
        .route("/api/v1/agents/{id}/metrics", put(routes::update_metrics))
        .route("/api/v1/route", post(routes::route_task))
        .route("/api/v1/delegate", post(routes::delegate_task))
        .route("/api/v1/negotiations/{task_id}", get(routes::get_negotiation))
        .route("/api/v1/collaborate", post(routes::collaborate))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting Agora API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
