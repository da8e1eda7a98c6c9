use std::collections::HashMap;

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::{AppError, Result};
use crate::voices::VoiceTable;

/// Path to an optional TOML file with tunables and voice overrides.
pub const CONFIG_PATH_VAR: &str = "LINEBRIDGE_CONFIG";

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ELEVEN_LABS_API_KEY: &str = "ELEVEN_LABS_API_KEY";
pub const LINE_CHANNEL_ACCESS_TOKEN: &str = "LINE_CHANNEL_ACCESS_TOKEN";
pub const LINE_CHANNEL_SECRET: &str = "LINE_CHANNEL_SECRET";

/// Credentials for the upstream services. Empty means "not configured".
#[derive(Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default, alias = "OPENAI_API_KEY")]
    pub openai_api_key: String,
    #[serde(default, alias = "ELEVEN_LABS_API_KEY")]
    pub elevenlabs_api_key: String,
    #[serde(default, alias = "LINE_CHANNEL_ACCESS_TOKEN")]
    pub line_channel_access_token: String,
    #[serde(default, alias = "LINE_CHANNEL_SECRET")]
    pub line_channel_secret: String,
}

impl Secrets {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).unwrap_or_default();
        Self {
            openai_api_key: get(OPENAI_API_KEY),
            elevenlabs_api_key: get(ELEVEN_LABS_API_KEY),
            line_channel_access_token: get(LINE_CHANNEL_ACCESS_TOKEN),
            line_channel_secret: get(LINE_CHANNEL_SECRET),
        }
    }

    /// Fill empty fields from `other`, keeping values already present.
    pub fn or(mut self, other: Secrets) -> Self {
        fn pick(current: &mut String, fallback: String) {
            if current.is_empty() {
                *current = fallback;
            }
        }
        pick(&mut self.openai_api_key, other.openai_api_key);
        pick(&mut self.elevenlabs_api_key, other.elevenlabs_api_key);
        pick(&mut self.line_channel_access_token, other.line_channel_access_token);
        pick(&mut self.line_channel_secret, other.line_channel_secret);
        self
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Secrets")
            .field("openai_api_key", &state(&self.openai_api_key))
            .field("elevenlabs_api_key", &state(&self.elevenlabs_api_key))
            .field("line_channel_access_token", &state(&self.line_channel_access_token))
            .field("line_channel_secret", &state(&self.line_channel_secret))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStrategy {
    /// One call that detects the input side of the pair and translates.
    #[default]
    OneStep,
    /// Identify the language first, then translate with a directional prompt.
    TwoStep,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub strategy: TranslationStrategy,
    pub model: String,
    /// Append "<detected> → <target>" to the text reply.
    pub annotate_direction: bool,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            strategy: TranslationStrategy::OneStep,
            model: "gpt-4o-mini".into(),
            annotate_direction: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub model_id: String,
    pub output_format: String,
    pub max_chars: usize,
    /// 128 kbps MP3.
    pub bytes_per_second: u64,
    pub min_duration_ms: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_id: "eleven_multilingual_v2".into(),
            output_format: "mp3_44100_128".into(),
            max_chars: 300,
            bytes_per_second: 16_000,
            min_duration_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct EndpointsFile {
    openai: String,
    elevenlabs: String,
    line_reply: String,
    line_upload: Option<String>,
}

impl Default for EndpointsFile {
    fn default() -> Self {
        Self {
            openai: "https://api.openai.com/v1/chat/completions".into(),
            elevenlabs: "https://api.elevenlabs.io/v1/text-to-speech/".into(),
            line_reply: "https://api.line.me/v2/bot/message/reply".into(),
            line_upload: None,
        }
    }
}

/// Upstream URLs, validated at load time.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub openai: Url,
    /// Base for `{base}/{voice_id}`; always ends with a slash.
    pub elevenlabs: Url,
    pub line_reply: Url,
    /// Binary audio upload returning a hosted URL. Without it, voice replies
    /// degrade to text.
    pub line_upload: Option<Url>,
}

impl Endpoints {
    fn from_file(file: EndpointsFile) -> Result<Self> {
        let mut elevenlabs = file.elevenlabs;
        if !elevenlabs.ends_with('/') {
            elevenlabs.push('/');
        }
        Ok(Self {
            openai: Url::parse(&file.openai)?,
            elevenlabs: Url::parse(&elevenlabs)?,
            line_reply: Url::parse(&file.line_reply)?,
            line_upload: file
                .line_upload
                .filter(|u| !u.is_empty())
                .map(|u| Url::parse(&u))
                .transpose()?,
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_file(EndpointsFile::default()).expect("default endpoints are valid URLs")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

/// Shape of the optional TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    translation: TranslationSettings,
    speech: SpeechSettings,
    endpoints: EndpointsFile,
    http: HttpSettings,
    voices: HashMap<String, String>,
}

impl FileConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secrets: Secrets,
    pub translation: TranslationSettings,
    pub speech: SpeechSettings,
    pub endpoints: Endpoints,
    pub http: HttpSettings,
    pub voices: VoiceTable,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secrets: Secrets::default(),
            translation: TranslationSettings::default(),
            speech: SpeechSettings::default(),
            endpoints: Endpoints::default(),
            http: HttpSettings::default(),
            voices: VoiceTable::default(),
            port: 8080,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = match lookup(CONFIG_PATH_VAR).filter(|p| !p.is_empty()) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| AppError::Config(format!("cannot read {path}: {e}")))?;
                info!(path = %path, "Loaded config file");
                FileConfig::from_toml(&raw)?
            }
            None => FileConfig::default(),
        };
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        Self::from_parts(file, Secrets::from_lookup(&lookup), port)
    }

    pub fn from_parts(file: FileConfig, secrets: Secrets, port: u16) -> Result<Self> {
        if file.speech.max_chars == 0 {
            return Err(AppError::Config("speech.max_chars must be positive".into()));
        }
        Ok(Self {
            secrets,
            translation: file.translation,
            speech: file.speech,
            endpoints: Endpoints::from_file(file.endpoints)?,
            http: file.http,
            voices: VoiceTable::default().merged_with(file.voices),
            port,
        })
    }
}
