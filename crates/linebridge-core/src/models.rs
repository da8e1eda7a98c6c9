use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::language::Language;

/// Webhook payload as delivered by the messaging platform.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    /// `null` or absent means no events. An event that does not fit the
    /// expected shape is kept as an unrecognized event and skipped later.
    #[serde(default, deserialize_with = "lenient_events")]
    pub events: Vec<InboundEvent>,
}

fn lenient_events<'de, D>(deserializer: D) -> std::result::Result<Vec<InboundEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                debug!(error = %e, "Unrecognized event shape");
                InboundEvent::default()
            })
        })
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<InboundMessage>,
    #[serde(default)]
    pub reply_token: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A text message event that the dispatcher can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent<'a> {
    pub text: &'a str,
    pub reply_token: &'a str,
}

impl InboundEvent {
    /// Returns the text and reply token when this is a text message event.
    pub fn as_text(&self) -> Option<TextEvent<'_>> {
        if self.kind.as_deref() != Some("message") {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind.as_deref() != Some("text") {
            return None;
        }
        Some(TextEvent {
            text: message.text.as_deref()?,
            reply_token: self.reply_token.as_deref()?,
        })
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_text: String,
    pub voice_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub translated_text: String,
    pub detected_language: Language,
}

impl TranslationResult {
    pub fn target_language(&self) -> Language {
        self.detected_language.opposite()
    }

    /// Human-readable direction, e.g. "English → Japanese".
    pub fn direction(&self) -> String {
        format!("{} → {}", self.detected_language, self.target_language())
    }
}

/// Audio hosted by the platform, ready to reference from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    pub remote_url: String,
    pub duration_ms: u64,
}

/// One part of a reply, in the platform's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    Audio {
        #[serde(rename = "originalContentUrl")]
        original_content_url: String,
        duration: u64,
    },
}

impl OutboundMessage {
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio { .. })
    }
}

impl From<AudioAsset> for OutboundMessage {
    fn from(asset: AudioAsset) -> Self {
        Self::Audio {
            original_content_url: asset.remote_url,
            duration: asset.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundReply {
    pub reply_token: String,
    pub messages: Vec<OutboundMessage>,
}

impl OutboundReply {
    /// Text always comes first; audio is appended only when an asset exists.
    pub fn new(reply_token: &str, text: String, audio: Option<AudioAsset>) -> Self {
        let mut messages = vec![OutboundMessage::Text { text }];
        if let Some(asset) = audio {
            messages.push(asset.into());
        }
        Self {
            reply_token: reply_token.to_string(),
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> InboundEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_message_is_actionable() {
        let ev = event(
            r#"{"type":"message","replyToken":"abc","timestamp":1700000000000,
                "message":{"type":"text","id":"1","text":"Hello"}}"#,
        );
        let text = ev.as_text().unwrap();
        assert_eq!(text.text, "Hello");
        assert_eq!(text.reply_token, "abc");
        assert!(ev.received_at().is_some());
    }

    #[test]
    fn non_text_events_are_not_actionable() {
        let follow = event(r#"{"type":"follow","replyToken":"abc"}"#);
        assert!(follow.as_text().is_none());

        let sticker = event(
            r#"{"type":"message","replyToken":"abc","message":{"type":"sticker","packageId":"1"}}"#,
        );
        assert!(sticker.as_text().is_none());

        let no_token = event(r#"{"type":"message","message":{"type":"text","text":"hi"}}"#);
        assert!(no_token.as_text().is_none());
    }

    #[test]
    fn missing_events_defaults_to_empty() {
        let body: WebhookBody = serde_json::from_str(r#"{"destination":"U123"}"#).unwrap();
        assert!(body.events.is_empty());

        let body: WebhookBody = serde_json::from_str(r#"{"events":null}"#).unwrap();
        assert!(body.events.is_empty());
    }

    #[test]
    fn odd_event_shapes_do_not_poison_the_batch() {
        let body: WebhookBody = serde_json::from_str(
            r#"{"events":[
                {"mode":"active"},
                {"type":42,"replyToken":"x"},
                {"type":"message","replyToken":"m","message":{"text":"no type"}},
                {"type":"message","replyToken":"abc","message":{"type":"text","text":"Hello"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(body.events.len(), 4);
        let actionable: Vec<_> = body.events.iter().filter_map(|e| e.as_text()).collect();
        assert_eq!(
            actionable,
            vec![TextEvent {
                text: "Hello",
                reply_token: "abc"
            }]
        );
    }

    #[test]
    fn reply_wire_format() {
        let reply = OutboundReply::new(
            "tok",
            "こんにちは".into(),
            Some(AudioAsset {
                remote_url: "https://cdn.example.com/a.mp3".into(),
                duration_ms: 2500,
            }),
        );
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["replyToken"], "tok");
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "こんにちは");
        assert_eq!(json["messages"][1]["type"], "audio");
        assert_eq!(
            json["messages"][1]["originalContentUrl"],
            "https://cdn.example.com/a.mp3"
        );
        assert_eq!(json["messages"][1]["duration"], 2500);
    }

    #[test]
    fn direction_annotation() {
        let result = TranslationResult {
            translated_text: "Hello".into(),
            detected_language: Language::Japanese,
        };
        assert_eq!(result.direction(), "Japanese → English");
    }
}
