use std::sync::Arc;

use linebridge_core::config::Settings;
use linebridge_server::{build_http_client, build_state, create_router};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().expect("Failed to load configuration");
    if settings.secrets.line_channel_secret.is_empty() {
        warn!("LINE_CHANNEL_SECRET is not set; every webhook will be rejected");
    }
    if settings.endpoints.line_upload.is_none() {
        info!("No audio upload endpoint configured; voice replies fall back to text");
    }

    let http_client = build_http_client(&settings).expect("Failed to build HTTP client");
    let state = Arc::new(build_state(&settings, http_client));
    let app = create_router(state);

    let port = settings.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("Failed to bind");

    info!(
        port,
        strategy = ?settings.translation.strategy,
        voices = settings.voices.len(),
        "Server starting"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
