use async_trait::async_trait;
use axum::body::Bytes;
use linebridge_core::config::ELEVEN_LABS_API_KEY;
use tracing::{info, warn};
use url::Url;

use crate::clients::{require_credential, ClientError, SpeechSynthesizer};

const SERVICE: &str = "ElevenLabs";

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    base: Url,
    model_id: String,
    output_format: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base: Url,
        model_id: String,
        output_format: String,
    ) -> Self {
        Self {
            client,
            api_key,
            base,
            model_id,
            output_format,
        }
    }

    fn voice_url(&self, voice_id: &str) -> Result<Url, ClientError> {
        let mut url = self.base.join(voice_id).map_err(|e| ClientError::Decode {
            service: SERVICE,
            detail: format!("bad voice id {voice_id:?}: {e}"),
        })?;
        url.query_pairs_mut()
            .append_pair("output_format", &self.output_format);
        Ok(url)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        require_credential(&self.api_key, ELEVEN_LABS_API_KEY)
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, ClientError> {
        self.ensure_configured()?;

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });
        let resp = self
            .client
            .post(self.voice_url(voice_id)?)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, voice = %voice_id, "ElevenLabs API error");
            return Err(ClientError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let audio = resp.bytes().await.map_err(|source| ClientError::Transport {
            service: SERVICE,
            source,
        })?;
        info!(bytes = audio.len(), voice = %voice_id, "Speech synthesized");
        Ok(audio)
    }
}
