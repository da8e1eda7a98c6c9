use async_trait::async_trait;
use axum::body::Bytes;
use linebridge_core::config::LINE_CHANNEL_ACCESS_TOKEN;
use linebridge_core::models::OutboundReply;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::clients::{require_credential, ClientError, MessagingPlatform};

const SERVICE: &str = "LINE";

/// Response of the audio upload endpoint. Hosts disagree on the field name.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "contentUrl", alias = "originalContentUrl")]
    url: String,
}

pub struct LineClient {
    client: reqwest::Client,
    access_token: String,
    reply_url: Url,
    upload_url: Option<Url>,
}

impl LineClient {
    pub fn new(
        client: reqwest::Client,
        access_token: String,
        reply_url: Url,
        upload_url: Option<Url>,
    ) -> Self {
        Self {
            client,
            access_token,
            reply_url,
            upload_url,
        }
    }

    async fn check_status(
        stage: &'static str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        warn!(stage, status = %status, body = %body, "LINE API error");
        Err(ClientError::Upstream {
            service: SERVICE,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessagingPlatform for LineClient {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        require_credential(&self.access_token, LINE_CHANNEL_ACCESS_TOKEN)
    }

    async fn upload_audio(&self, audio: Bytes) -> Result<String, ClientError> {
        self.ensure_configured()?;
        let url = self
            .upload_url
            .clone()
            .ok_or(ClientError::NotConfigured("audio upload endpoint"))?;

        let size = audio.len();
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .header("content-type", "audio/mpeg")
            .body(audio)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;
        let resp = Self::check_status("upload", resp).await?;

        let raw = resp.text().await.map_err(|source| ClientError::Transport {
            service: SERVICE,
            source,
        })?;
        let remote_url = parse_upload_response(&raw)?;
        info!(bytes = size, url = %remote_url, "Audio uploaded");
        Ok(remote_url)
    }

    async fn reply(&self, reply: &OutboundReply) -> Result<(), ClientError> {
        self.ensure_configured()?;
        let resp = self
            .client
            .post(self.reply_url.clone())
            .bearer_auth(&self.access_token)
            .json(reply)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;
        Self::check_status("reply", resp).await?;
        info!(parts = reply.messages.len(), "Reply sent");
        Ok(())
    }
}

fn parse_upload_response(raw: &str) -> Result<String, ClientError> {
    let parsed: UploadResponse = serde_json::from_str(raw).map_err(|e| ClientError::Decode {
        service: SERVICE,
        detail: format!("{e} (body: {raw})"),
    })?;
    if !parsed.url.starts_with("https://") {
        return Err(ClientError::Decode {
            service: SERVICE,
            detail: format!("audio URL must be https: {}", parsed.url),
        });
    }
    Ok(parsed.url)
}
