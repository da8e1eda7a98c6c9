//! LINE webhook dispatcher.
//!
//! One delivery is handled end to end: verify the signature over the raw
//! body, parse events, and for each text message translate, optionally
//! synthesize and upload speech, then reply with the event's reply token.
//! Events run sequentially; the first fatal error ends the delivery.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use linebridge_core::config::SpeechSettings;
use linebridge_core::models::{AudioAsset, OutboundReply, TextEvent, WebhookBody};
use linebridge_core::signature::verify_signature;
use linebridge_core::text::{
    classify_script, estimate_duration_ms, parse_request, prepare_for_speech,
};
use linebridge_core::voices::VoiceTable;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::clients::{
    ClientError, MessagingPlatform, SpeechSynthesizer, TranslateOptions, Translator,
};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("No events received")]
    NoEvents,

    #[error("{0} is missing")]
    MissingCredential(&'static str),

    #[error("Translation failed: {0}")]
    Translation(ClientError),

    #[error("Failed to send reply: {0}")]
    Reply(ClientError),
}

impl WebhookError {
    fn from_translation(err: ClientError) -> Self {
        match err {
            ClientError::MissingCredential(name) => Self::MissingCredential(name),
            other => Self::Translation(other),
        }
    }

    fn from_reply(err: ClientError) -> Self {
        match err {
            ClientError::MissingCredential(name) => Self::MissingCredential(name),
            other => Self::Reply(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::MalformedBody(_) | Self::NoEvents => StatusCode::BAD_REQUEST,
            Self::MissingCredential(_) | Self::Translation(_) | Self::Reply(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::InvalidSignature => serde_json::json!({"error": "Invalid signature"}),
            Self::MalformedBody(_) => serde_json::json!({"error": "Invalid request body"}),
            Self::NoEvents => serde_json::json!({"error": "No events received"}),
            Self::MissingCredential(name) => {
                serde_json::json!({"error": format!("{name} is missing")})
            }
            Self::Translation(e) => {
                serde_json::json!({"error": "Translation failed", "details": e.details()})
            }
            Self::Reply(e) => {
                serde_json::json!({"error": "Failed to send reply", "details": e.details()})
            }
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Tallies for one delivery.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub replied: usize,
    pub skipped: usize,
    pub with_audio: usize,
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub annotate_direction: bool,
    pub speech: SpeechSettings,
}

pub struct Dispatcher {
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    platform: Arc<dyn MessagingPlatform>,
    voices: VoiceTable,
    channel_secret: String,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        platform: Arc<dyn MessagingPlatform>,
        voices: VoiceTable,
        channel_secret: String,
        options: DispatchOptions,
    ) -> Self {
        Self {
            translator,
            synthesizer,
            platform,
            voices,
            channel_secret,
            options,
        }
    }

    /// Handle one webhook delivery from its raw body and signature header.
    pub async fn dispatch(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<DispatchSummary, WebhookError> {
        let delivery_id = uuid::Uuid::new_v4();
        self.dispatch_inner(body, signature)
            .instrument(tracing::info_span!("webhook", %delivery_id))
            .await
    }

    async fn dispatch_inner(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<DispatchSummary, WebhookError> {
        if !verify_signature(body, signature.unwrap_or_default(), &self.channel_secret) {
            if self.channel_secret.is_empty() {
                warn!("LINE channel secret not configured, rejecting webhook");
            } else {
                warn!(has_header = signature.is_some(), "Webhook signature verification failed");
            }
            return Err(WebhookError::InvalidSignature);
        }

        let payload: WebhookBody = serde_json::from_slice(body).map_err(|e| {
            warn!(error = %e, "Failed to parse webhook body");
            WebhookError::from(e)
        })?;
        if payload.events.is_empty() {
            info!("Webhook carried no events");
            return Err(WebhookError::NoEvents);
        }

        let mut summary = DispatchSummary::default();
        for event in &payload.events {
            if let Some(at) = event.received_at() {
                debug!(lag_ms = (Utc::now() - at).num_milliseconds(), "Event delivery lag");
            }
            let Some(text_event) = event.as_text() else {
                debug!(
                    event_type = event.kind.as_deref().unwrap_or("unknown"),
                    "Skipping non-text event"
                );
                summary.skipped += 1;
                continue;
            };
            match self.handle_text(text_event).await? {
                Some(with_audio) => {
                    summary.replied += 1;
                    if with_audio {
                        summary.with_audio += 1;
                    }
                }
                None => summary.skipped += 1,
            }
        }

        info!(
            replied = summary.replied,
            skipped = summary.skipped,
            with_audio = summary.with_audio,
            "Webhook processed"
        );
        Ok(summary)
    }

    /// Returns `Some(with_audio)` when a reply was sent, `None` when skipped.
    async fn handle_text(&self, event: TextEvent<'_>) -> Result<Option<bool>, WebhookError> {
        let request = parse_request(event.text);
        if request.source_text.is_empty() {
            debug!("Skipping message with no text to translate");
            return Ok(None);
        }

        self.translator
            .ensure_configured()
            .map_err(WebhookError::from_translation)?;
        self.platform
            .ensure_configured()
            .map_err(WebhookError::from_reply)?;

        let result = self
            .translator
            .translate(&request.source_text, &TranslateOptions::default())
            .await
            .map_err(|e| {
                warn!(stage = "translate", error = %e, "Translation failed, no reply sent");
                WebhookError::from_translation(e)
            })?;

        let mut text = result.translated_text.clone();
        if self.options.annotate_direction {
            text = format!("{text}\n\n({})", result.direction());
        }

        let audio = if request.voice_requested && self.options.speech.enabled {
            self.speak(&result.translated_text).await
        } else {
            None
        };
        let with_audio = audio.is_some();

        let reply = OutboundReply::new(event.reply_token, text, audio);
        self.platform.reply(&reply).await.map_err(|e| {
            warn!(stage = "reply", error = %e, "Reply failed");
            WebhookError::from_reply(e)
        })?;
        Ok(Some(with_audio))
    }

    /// Synthesize and upload speech. Failures are logged and yield `None`
    /// so the caller falls back to a text-only reply.
    async fn speak(&self, translated: &str) -> Option<AudioAsset> {
        let speech = &self.options.speech;
        let language = classify_script(translated);
        let voice_id = self.voices.voice_for(language.code());
        let text = prepare_for_speech(translated, language.code(), speech.max_chars);

        let audio = match self.synthesizer.synthesize(&text, voice_id).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(stage = "synthesize", error = %e, "Speech synthesis failed, replying with text only");
                return None;
            }
        };

        let duration_ms =
            estimate_duration_ms(audio.len(), speech.bytes_per_second, speech.min_duration_ms);
        match self.platform.upload_audio(audio).await {
            Ok(remote_url) => Some(AudioAsset {
                remote_url,
                duration_ms,
            }),
            Err(e) => {
                warn!(stage = "upload", error = %e, "Audio upload failed, replying with text only");
                None
            }
        }
    }
}
