//! In-memory upstreams and request builders shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, Response};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use linebridge_core::config::SpeechSettings;
use linebridge_core::models::{OutboundReply, TranslationResult};
use linebridge_core::voices::VoiceTable;
use linebridge_core::Language;
use linebridge_server::clients::{
    ClientError, MessagingPlatform, SpeechSynthesizer, TranslateOptions, Translator,
};
use linebridge_server::create_router;
use linebridge_server::dispatcher::{DispatchOptions, Dispatcher};
use linebridge_server::routes::AppState;
use sha2::Sha256;
use tower::ServiceExt;

pub const SECRET: &str = "test-channel-secret";
pub const JA_VOICE: &str = "ja-test-voice";
pub const EN_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

pub fn test_voices() -> VoiceTable {
    let overrides = [("ja".to_string(), JA_VOICE.to_string())].into_iter().collect();
    VoiceTable::default().merged_with(overrides)
}

/// Signature computed independently of the crate under test.
pub fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

pub fn text_event(text: &str, reply_token: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "replyToken": reply_token,
        "timestamp": 1_700_000_000_000i64,
        "source": {"type": "user", "userId": "U0001"},
        "message": {"id": "1", "type": "text", "text": text}
    })
}

pub fn webhook_body(events: Vec<serde_json::Value>) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({"destination": "Ubot", "events": events})).unwrap()
}

#[derive(Default)]
pub struct MockTranslator {
    pub fail_with: Option<u16>,
    pub missing_key: bool,
    pub calls: Mutex<Vec<(String, TranslateOptions)>>,
}

impl MockTranslator {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Default::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

/// Japanese in gives a fixed English sentence; anything else gets "翻訳: " prepended.
#[async_trait]
impl Translator for MockTranslator {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        if self.missing_key {
            Err(ClientError::MissingCredential("OPENAI_API_KEY"))
        } else {
            Ok(())
        }
    }

    async fn translate(
        &self,
        text: &str,
        options: &TranslateOptions,
    ) -> Result<TranslationResult, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), options.clone()));
        if let Some(status) = self.fail_with {
            return Err(ClientError::Upstream {
                service: "OpenAI",
                status,
                body: r#"{"error":{"message":"upstream exploded"}}"#.into(),
            });
        }
        let detected = linebridge_core::text::classify_script(text);
        let translated_text = match detected {
            Language::Japanese => "translated to English".to_string(),
            Language::English => format!("翻訳: {text}"),
        };
        Ok(TranslationResult {
            translated_text,
            detected_language: detected,
        })
    }
}

#[derive(Default)]
pub struct MockSynthesizer {
    pub fail: bool,
    pub audio_len: usize,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockSynthesizer {
    pub fn producing(audio_len: usize) -> Self {
        Self {
            audio_len,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        if self.fail {
            return Err(ClientError::Upstream {
                service: "ElevenLabs",
                status: 401,
                body: r#"{"detail":{"message":"Invalid API key"}}"#.into(),
            });
        }
        Ok(Bytes::from(vec![0u8; self.audio_len]))
    }
}

#[derive(Default)]
pub struct MockPlatform {
    pub fail_reply: bool,
    pub fail_upload: bool,
    pub missing_token: bool,
    pub replies: Mutex<Vec<OutboundReply>>,
    pub uploads: Mutex<Vec<usize>>,
}

impl MockPlatform {
    pub fn replies(&self) -> Vec<OutboundReply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingPlatform for MockPlatform {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        if self.missing_token {
            Err(ClientError::MissingCredential("LINE_CHANNEL_ACCESS_TOKEN"))
        } else {
            Ok(())
        }
    }

    async fn upload_audio(&self, audio: Bytes) -> Result<String, ClientError> {
        self.uploads.lock().unwrap().push(audio.len());
        if self.fail_upload {
            return Err(ClientError::NotConfigured("audio upload endpoint"));
        }
        Ok("https://media.example.com/audio/1.mp3".into())
    }

    async fn reply(&self, reply: &OutboundReply) -> Result<(), ClientError> {
        if self.fail_reply {
            return Err(ClientError::Upstream {
                service: "LINE",
                status: 400,
                body: r#"{"message":"Invalid reply token"}"#.into(),
            });
        }
        self.replies.lock().unwrap().push(reply.clone());
        Ok(())
    }
}

pub struct Harness {
    pub translator: Arc<MockTranslator>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub platform: Arc<MockPlatform>,
    pub options: DispatchOptions,
    pub secret: String,
}

impl Harness {
    pub fn new(
        translator: MockTranslator,
        synthesizer: MockSynthesizer,
        platform: MockPlatform,
    ) -> Self {
        Self {
            translator: Arc::new(translator),
            synthesizer: Arc::new(synthesizer),
            platform: Arc::new(platform),
            options: DispatchOptions {
                annotate_direction: false,
                speech: SpeechSettings::default(),
            },
            secret: SECRET.to_string(),
        }
    }

    pub fn ok() -> Self {
        Self::new(
            MockTranslator::default(),
            MockSynthesizer::producing(48_000),
            MockPlatform::default(),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.translator.clone(),
            self.synthesizer.clone(),
            self.platform.clone(),
            test_voices(),
            self.secret.clone(),
            self.options.clone(),
        )
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher(),
            translator: self.translator.clone(),
            synthesizer: self.synthesizer.clone(),
            voices: test_voices(),
        };
        create_router(Arc::new(state))
    }
}

pub fn webhook_request(body: Vec<u8>, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/line")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("x-line-signature", sig);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.expect("oneshot request failed")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
