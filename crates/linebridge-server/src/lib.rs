pub mod clients;
pub mod dispatcher;
pub mod elevenlabs;
pub mod line;
pub mod openai;
pub mod routes;

#[cfg(test)]
mod test_upstream;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use linebridge_core::config::Settings;
use linebridge_core::signature::SIGNATURE_HEADER;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::dispatcher::{DispatchOptions, Dispatcher};
use crate::elevenlabs::ElevenLabsSynthesizer;
use crate::line::LineClient;
use crate::openai::OpenAiTranslator;
use crate::routes::AppState;

/// Shared HTTP client with explicit per-call timeouts.
pub fn build_http_client(settings: &Settings) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http.timeout_secs))
        .connect_timeout(Duration::from_secs(settings.http.connect_timeout_secs))
        .user_agent("linebridge/0.1")
        .build()
}

/// Construct every vendor client once and wire them into the app state.
pub fn build_state(settings: &Settings, http_client: reqwest::Client) -> AppState {
    let secrets = &settings.secrets;
    let endpoints = &settings.endpoints;

    let translator = Arc::new(OpenAiTranslator::new(
        http_client.clone(),
        secrets.openai_api_key.clone(),
        endpoints.openai.clone(),
        settings.translation.model.clone(),
        settings.translation.strategy,
    ));
    let synthesizer = Arc::new(ElevenLabsSynthesizer::new(
        http_client.clone(),
        secrets.elevenlabs_api_key.clone(),
        endpoints.elevenlabs.clone(),
        settings.speech.model_id.clone(),
        settings.speech.output_format.clone(),
    ));
    let platform = Arc::new(LineClient::new(
        http_client,
        secrets.line_channel_access_token.clone(),
        endpoints.line_reply.clone(),
        endpoints.line_upload.clone(),
    ));

    let dispatcher = Dispatcher::new(
        translator.clone(),
        synthesizer.clone(),
        platform,
        settings.voices.clone(),
        secrets.line_channel_secret.clone(),
        DispatchOptions {
            annotate_direction: settings.translation.annotate_direction,
            speech: settings.speech.clone(),
        },
    );

    AppState {
        dispatcher,
        translator,
        synthesizer,
        voices: settings.voices.clone(),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(SIGNATURE_HEADER),
        ]);

    Router::new()
        .route(
            "/api/line",
            post(routes::handle_line_webhook).options(routes::handle_line_preflight),
        )
        .route("/api/tts", post(routes::handle_tts))
        .route("/api/translate", post(routes::handle_translate))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(256))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}
