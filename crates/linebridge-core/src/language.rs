use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The two languages the bot translates between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Japanese,
}

impl Language {
    /// ISO 639-1 code, also the key into the voice table.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Japanese => "ja",
        }
    }

    /// Label used in prompts and in the reply annotation.
    pub fn label(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Japanese => "Japanese",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::English => Self::Japanese,
            Self::Japanese => Self::English,
        }
    }

    /// Parse a language-identification answer, tolerating trailing punctuation.
    pub fn from_label(answer: &str) -> Option<Self> {
        let word = answer
            .trim()
            .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        word.parse().ok()
    }

    pub fn all() -> &'static [Language] {
        &[Self::English, Self::Japanese]
    }
}

/// Accepts codes ("en"), labels ("English") and native names ("日本語").
impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" | "英語" => Ok(Self::English),
            "ja" | "jp" | "japanese" | "日本語" => Ok(Self::Japanese),
            _ => Err(AppError::UnsupportedLanguage(s.trim().to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Register to translate into, keyed by who is being addressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Stranger,
    Friend,
    Superior,
    Child,
}

impl Formality {
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Stranger => "Use formal/polite speech.",
            Self::Friend => "Use casual/informal speech.",
            Self::Superior => "Use honorific/respectful language.",
            Self::Child => "Use simple, friendly language.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_flips_the_pair() {
        for lang in Language::all() {
            assert_ne!(*lang, lang.opposite());
            assert_eq!(*lang, lang.opposite().opposite());
        }
    }

    #[test]
    fn parses_codes_and_labels() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::English);
        assert_eq!(" Japanese ".parse::<Language>().unwrap(), Language::Japanese);
        assert_eq!("日本語".parse::<Language>().unwrap(), Language::Japanese);
        match "French".parse::<Language>() {
            Err(AppError::UnsupportedLanguage(name)) => assert_eq!(name, "French"),
            other => panic!("expected unsupported language, got {other:?}"),
        }
    }

    #[test]
    fn formality_deserializes_lowercase() {
        let f: Formality = serde_json::from_str("\"superior\"").unwrap();
        assert_eq!(f, Formality::Superior);
        assert!(f.instruction().contains("honorific"));
    }

    #[test]
    fn from_label_strips_punctuation() {
        assert_eq!(Language::from_label(" Japanese.\n"), Some(Language::Japanese));
        assert_eq!(Language::from_label("\"English\""), Some(Language::English));
        assert_eq!(Language::from_label("Spanish"), None);
    }
}
