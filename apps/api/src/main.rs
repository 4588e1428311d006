mod config;
mod critique;
mod errors;
mod layout;
mod llm_client;
mod models;
mod narrative;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::critique::llm_critic::LlmCritic;
use crate::critique::CritiqueService;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Critique service is optional; both pipelines run without it.
    let critic: Option<Arc<dyn CritiqueService>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!(
                "Critique service enabled (model: {}, timeout {}ms)",
                llm_client::MODEL,
                config.critique_timeout_ms
            );
            let critic: Arc<dyn CritiqueService> = Arc::new(LlmCritic::new(llm));
            Some(critic)
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; critique service disabled");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        critic,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the editor front end has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
