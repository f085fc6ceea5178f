//! Leadline gateway binary.

use std::sync::Arc;

use leadline_gateway::{app, AppState, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    tracing::info!(
        "[GATEWAY] backend {} | vapi {} | model {}",
        config.backend_url,
        config.vapi_base_url,
        config.gemini_model
    );

    let state = Arc::new(AppState::from_config(&config));
    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    tracing::info!("[GATEWAY] listening on {}", config.bind_addr);

    axum::serve(listener, app(state, &config)).await?;
    Ok(())
}
