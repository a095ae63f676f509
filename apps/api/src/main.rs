mod chat;
mod config;
mod content;
mod errors;
mod llm_client;
mod render;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chat::store::SessionStore;
use crate::chat::transport::{ChatTransport, DirectTransport, ProxyTransport};
use crate::config::{ChatBackend, Config};
use crate::content::ContentStore;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting portfolio site v{}", env!("CARGO_PKG_VERSION"));

    // Load the CV content once; read-only from here on
    let content = Arc::new(ContentStore::load(config.content_path.as_deref())?);

    // Pick the chat transport
    let transport = build_transport(&config, &content)?;
    info!("Chat transport: {}", transport.name());

    let sessions = SessionStore::new(config.session_idle_minutes, config.max_sessions);

    let state = AppState {
        content,
        transport,
        sessions,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the site has a fixed domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_transport(config: &Config, content: &ContentStore) -> Result<Arc<dyn ChatTransport>> {
    let transport: Arc<dyn ChatTransport> = match &config.chat_backend {
        ChatBackend::Direct { api_key, model } => {
            let client = GeminiClient::new(api_key.clone(), model.clone())?;
            info!("Gemini client initialized (model: {})", client.model());
            Arc::new(DirectTransport::new(client, content.briefing()))
        }
        ChatBackend::Proxy { url, token } => {
            info!("Relaying chat to {url}");
            Arc::new(ProxyTransport::new(url.clone(), token.clone())?)
        }
    };
    Ok(transport)
}
