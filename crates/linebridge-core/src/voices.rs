use std::collections::HashMap;

use crate::error::{AppError, Result};

const DEFAULT_VOICES_TOML: &str = include_str!("../voices.toml");
const DEFAULT_KEY: &str = "default";

/// Static language-code → voice-id lookup with a default fallback.
#[derive(Debug, Clone)]
pub struct VoiceTable {
    voices: HashMap<String, String>,
    default_voice: String,
}

impl VoiceTable {
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let voices: HashMap<String, String> = toml::from_str(toml_str)?;
        Self::from_map(voices)
    }

    pub fn from_map(mut voices: HashMap<String, String>) -> Result<Self> {
        let default_voice = voices
            .remove(DEFAULT_KEY)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Config("voice table has no `default` entry".into()))?;
        let voices = voices
            .into_iter()
            .map(|(lang, voice)| (lang.to_lowercase(), voice))
            .collect();
        Ok(Self {
            voices,
            default_voice,
        })
    }

    /// Overlay entries (including `default`) on top of this table.
    pub fn merged_with(mut self, overrides: HashMap<String, String>) -> Self {
        for (lang, voice) in overrides {
            if voice.is_empty() {
                continue;
            }
            if lang == DEFAULT_KEY {
                self.default_voice = voice;
            } else {
                self.voices.insert(lang.to_lowercase(), voice);
            }
        }
        self
    }

    pub fn voice_for(&self, language_code: &str) -> &str {
        self.voices
            .get(&language_code.to_lowercase())
            .map(String::as_str)
            .unwrap_or(&self.default_voice)
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

impl Default for VoiceTable {
    fn default() -> Self {
        // The embedded table is covered by tests below.
        Self::from_toml(DEFAULT_VOICES_TOML).unwrap_or_else(|_| Self {
            voices: HashMap::new(),
            default_voice: String::new(),
        })
    }
}
