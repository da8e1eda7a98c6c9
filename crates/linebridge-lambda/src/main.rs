use std::sync::Arc;

use linebridge_core::config::{Secrets, Settings};
use linebridge_server::{build_http_client, build_state, create_router};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut settings =
        Settings::from_env().map_err(|e| lambda_http::Error::from(e.to_string()))?;

    // Optional JSON secret bundle, e.g. {"OPENAI_API_KEY": "...", "LINE_CHANNEL_SECRET": "..."}.
    // Values already present in the environment win.
    if let Some(secret_id) = std::env::var("LINEBRIDGE_SECRET_ID")
        .ok()
        .filter(|s| !s.is_empty())
    {
        let bundle = load_secret_bundle(&secret_id).await?;
        settings.secrets = settings.secrets.or(bundle);
        info!(secret_id = %secret_id, "Secrets loaded from Secrets Manager");
    }

    let http_client =
        build_http_client(&settings).map_err(|e| lambda_http::Error::from(e.to_string()))?;
    let app = create_router(Arc::new(build_state(&settings, http_client)));

    lambda_http::run(app).await
}

async fn load_secret_bundle(secret_id: &str) -> Result<Secrets, lambda_http::Error> {
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sm_client = aws_sdk_secretsmanager::Client::new(&aws_config);
    let raw = sm_client
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load secret bundle");
            lambda_http::Error::from(format!("Secret not found: {}", e))
        })?
        .secret_string()
        .unwrap_or_default()
        .to_string();

    serde_json::from_str(&raw)
        .map_err(|e| lambda_http::Error::from(format!("Secret bundle is not valid JSON: {e}")))
}
