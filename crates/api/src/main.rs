//! Agora API server binary.
//!
//! Usage:
//!   agora-api --config agora.toml
//!   agora-api --port 8080
//!   agora-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `AGORA_API_KEY` - API authentication key (recommended)
//! - `AGORA_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `OPENAI_API_KEY` - Key for the `openai` provider

use agora_api::{ApiKey, AppState, serve};
use agora_coordinator::RouterConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "agora-api", version, about = "Agora task routing API server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind address (default: AGORA_BIND_ADDR, then 127.0.0.1)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,agora_api=debug,agora_coordinator=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let host = args
        .bind
        .or_else(|| std::env::var("AGORA_BIND_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    if host == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes the API to all network interfaces. \
             Ensure AGORA_API_KEY is set and a firewall is in place."
        );
    }

    let config = if let Some(path) = args.config {
        tracing::info!(path = %path.display(), "Loading configuration");
        RouterConfig::from_file(&path)?
    } else {
        tracing::info!("Using default configuration");
        RouterConfig::default()
    };

    let mut state = AppState::new(&config)?;
    match std::env::var("AGORA_API_KEY") {
        Ok(key) if !key.is_empty() => {
            state = state.with_api_key(ApiKey::new(key));
            tracing::info!("API key authentication enabled");
        }
        _ => tracing::warn!(
            "AGORA_API_KEY not set. The API will run without authentication, \
             which is acceptable for local development only."
        ),
    }

    let embedded = state.router.initialize().await;
    tracing::info!(agents = embedded, "Agent profiles embedded");

    let addr: SocketAddr = format!("{host}:{}", args.port).parse()?;
    serve(Arc::new(state), addr).await?;

    Ok(())
}
