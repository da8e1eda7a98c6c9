use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use linebridge_core::signature::SIGNATURE_HEADER;
use linebridge_core::text::preprocess_for_speech;
use linebridge_core::voices::VoiceTable;
use linebridge_core::{Formality, Language};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clients::{ClientError, SpeechSynthesizer, TranslateOptions, Translator};
use crate::dispatcher::Dispatcher;

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub voices: VoiceTable,
}

/// POST /api/line
pub async fn handle_line_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.dispatcher.dispatch(&body, signature).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "Message processed"})),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// OPTIONS /api/line
pub async fn handle_line_preflight() -> Response {
    let mut resp = StatusCode::NO_CONTENT.into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, x-line-signature"),
    );
    resp
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// POST /api/tts
pub async fn handle_tts(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TtsRequest>,
) -> Response {
    if body.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "No text provided"})),
        )
            .into_response();
    }

    // No length cap here; the dashboard plays the whole text.
    let language = body.language.as_deref().unwrap_or("default");
    let voice_id = state.voices.voice_for(language);
    let text = preprocess_for_speech(&body.text, language);

    match state.synthesizer.synthesize(&text, voice_id).await {
        Ok(bytes) => audio_response(bytes),
        Err(ClientError::MissingCredential(name)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("{name} is missing")})),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, language, "TTS request failed");
            let status = e
                .upstream_status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(serde_json::json!({"error": upstream_message(&e)})),
            )
                .into_response()
        }
    }
}

/// Pull `error.message` or `detail.message` out of a vendor error body.
fn upstream_message(err: &ClientError) -> String {
    let ClientError::Upstream { body, .. } = err else {
        return err.to_string();
    };
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    ["error", "detail"]
        .iter()
        .find_map(|k| parsed[k]["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "Error from speech API".to_string())
}

fn audio_response(bytes: Bytes) -> Response {
    let len = bytes.len();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from(bytes),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub formality: Option<Formality>,
    #[serde(default)]
    pub speaker_pronouns: Option<String>,
    #[serde(default)]
    pub listener_pronouns: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translation: String,
    pub detected_language: Language,
}

/// POST /api/translate
pub async fn handle_translate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TranslateBody>,
) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "No text provided"})),
        )
            .into_response();
    }

    let (source, target) = match (
        requested_language(body.source_language.as_deref()),
        requested_language(body.target_language.as_deref()),
    ) {
        (Ok(source), Ok(target)) => (source, target),
        (Err(name), _) | (_, Err(name)) => {
            warn!(language = %name, "Unsupported language requested");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Unsupported language"})),
            )
                .into_response();
        }
    };

    let options = TranslateOptions {
        source,
        target,
        formality: body.formality,
        speaker_pronouns: body.speaker_pronouns,
        listener_pronouns: body.listener_pronouns,
    };

    match state.translator.translate(text, &options).await {
        Ok(result) => {
            info!(detected = %result.detected_language, "Dashboard translation complete");
            (
                StatusCode::OK,
                Json(TranslateResponse {
                    translation: result.translated_text,
                    detected_language: result.detected_language,
                }),
            )
                .into_response()
        }
        Err(ClientError::MissingCredential(name)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("{name} is missing")})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Translation failed", "details": e.details()})),
        )
            .into_response(),
    }
}

/// Blank means auto; anything outside the pair is rejected.
fn requested_language(name: Option<&str>) -> Result<Option<Language>, String> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(None),
        Some(n) => n.parse().map(Some).map_err(|_| n.to_string()),
    }
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
