//! Seams between the dispatcher and the upstream services.
//!
//! Each vendor client is built once at startup and shared behind an `Arc`,
//! so handlers never reach for module-level singletons and tests can swap in
//! in-memory implementations.

use async_trait::async_trait;
use axum::body::Bytes;
use linebridge_core::models::{OutboundReply, TranslationResult};
use linebridge_core::{Formality, Language};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} is missing")]
    MissingCredential(&'static str),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },
}

impl ClientError {
    /// Diagnostic detail for error responses: the raw upstream body when there is one.
    pub fn details(&self) -> String {
        match self {
            Self::Upstream { body, .. } if !body.is_empty() => body.clone(),
            other => other.to_string(),
        }
    }

    /// Upstream HTTP status, if the upstream answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Fail with `MissingCredential` when a key is empty.
pub fn require_credential(value: &str, name: &'static str) -> Result<(), ClientError> {
    if value.is_empty() {
        Err(ClientError::MissingCredential(name))
    } else {
        Ok(())
    }
}

/// Per-call translation hints. The default auto-detects within the language pair.
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    pub source: Option<Language>,
    pub target: Option<Language>,
    pub formality: Option<Formality>,
    pub speaker_pronouns: Option<String>,
    pub listener_pronouns: Option<String>,
}

impl TranslateOptions {
    /// Resolve the direction when either side was given explicitly.
    pub fn direction(&self) -> Option<(Language, Language)> {
        match (self.source, self.target) {
            (Some(source), Some(target)) if source != target => Some((source, target)),
            (Some(source), _) => Some((source, source.opposite())),
            (None, Some(target)) => Some((target.opposite(), target)),
            (None, None) => None,
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Check credentials before any call is attempted.
    fn ensure_configured(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn translate(
        &self,
        text: &str,
        options: &TranslateOptions,
    ) -> Result<TranslationResult, ClientError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        Ok(())
    }

    /// Returns MP3 bytes.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, ClientError>;
}

#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        Ok(())
    }

    /// Upload `audio/mpeg` bytes and return the hosted URL.
    async fn upload_audio(&self, audio: Bytes) -> Result<String, ClientError>;

    /// Send a reply using the event's one-time reply token.
    async fn reply(&self, reply: &OutboundReply) -> Result<(), ClientError>;
}
