use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use chat_bridge::app::build_app;
use chat_bridge::config::Settings;
use chat_bridge::security::CustomHeaderValidator;
use chat_bridge::services::{MessageRouter, OpenAiClient, Preamble, SessionStore};
use chat_bridge::state::AppState;
use chat_bridge::transport::ReplyClient;
use chat_bridge::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logger()?;

    info!("🚀 Starting chat bridge...");

    let settings = Settings::load()?;
    info!(
        "✅ Configuration loaded (max_length={}, classifier={:?}, image size={})",
        settings.dialogue.max_length,
        settings.classifier.strategy,
        settings.image.size.as_str()
    );

    if settings.backend.api_key.is_empty() {
        warn!("No backend api key configured (backend.api_key / OPENAI_KEY); calls will be rejected upstream");
    }

    let backend = Arc::new(OpenAiClient::new(settings.backend.clone())?);
    let sessions = SessionStore::new(Preamble::from_config(&settings.dialogue));

    let router = MessageRouter::from_settings(&settings, sessions.clone(), backend.clone(), backend)?;
    info!("✅ Message router ready");

    let state = AppState {
        reply_client: Arc::new(ReplyClient::new(&settings.transport)?),
        header_validator: Arc::new(CustomHeaderValidator::from_config(&settings.security)),
        router: Arc::new(router),
        sessions,
        settings: Arc::new(settings.clone()),
    };

    let app = build_app(state);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Webhook listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
