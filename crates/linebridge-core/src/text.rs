//! Text handling around translation and speech: the voice-mode prefix,
//! script classification, length capping and per-language preprocessing.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

use crate::language::Language;
use crate::models::TranslationRequest;

pub const VOICE_PREFIX: &str = "voice-";
pub const TRUNCATION_MARKER: &str = "…";

/// Hiragana, Katakana, CJK ideographs (plus extension A and compatibility),
/// CJK punctuation and half-width Katakana.
fn japanese_script() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"[\x{3000}-\x{303F}\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{3400}-\x{4DBF}\x{4E00}-\x{9FFF}\x{F900}-\x{FAFF}\x{FF66}-\x{FF9F}]",
        )
        .expect("japanese script pattern is valid")
    })
}

/// Split off a case-insensitive `voice-` prefix.
pub fn parse_request(text: &str) -> TranslationRequest {
    let trimmed = text.trim_start();
    let has_prefix = trimmed
        .get(..VOICE_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(VOICE_PREFIX));

    if has_prefix {
        TranslationRequest {
            source_text: trimmed[VOICE_PREFIX.len()..].trim().to_string(),
            voice_requested: true,
        }
    } else {
        TranslationRequest {
            source_text: text.trim().to_string(),
            voice_requested: false,
        }
    }
}

fn is_ascii_ish(c: char) -> bool {
    c.is_ascii()
        || matches!(c, '\u{00A0}'..='\u{024F}' | '\u{2000}'..='\u{206F}' | '\u{20AC}')
}

/// Guess which side of the pair a text is written in from its script.
///
/// Any Japanese-range character means Japanese. Otherwise text made only of
/// ASCII-ish characters is English, and anything else falls back to Japanese.
/// Mixed-script input can be misclassified; only voice choice depends on it.
pub fn classify_script(text: &str) -> Language {
    if japanese_script().is_match(text) {
        return Language::Japanese;
    }
    if text.chars().all(is_ascii_ish) {
        Language::English
    } else {
        Language::Japanese
    }
}

/// Cap text at `max_chars` characters, appending the truncation marker when cut.
pub fn truncate_for_speech(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Language-specific cleanup before synthesis. Spanish loses its diacritics.
pub fn preprocess_for_speech(text: &str, language_code: &str) -> String {
    if language_code.eq_ignore_ascii_case("es") {
        strip_diacritics(text)
    } else {
        text.to_string()
    }
}

fn strip_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !('\u{0300}'..='\u{036F}').contains(c))
        .collect()
}

/// Preprocess for the language, then cap the length.
pub fn prepare_for_speech(text: &str, language_code: &str, max_chars: usize) -> String {
    truncate_for_speech(&preprocess_for_speech(text, language_code), max_chars)
}

/// Estimate clip length from its byte size; the synthesis API reports none.
pub fn estimate_duration_ms(byte_len: usize, bytes_per_second: u64, min_ms: u64) -> u64 {
    if bytes_per_second == 0 {
        return min_ms;
    }
    let estimate = (byte_len as u64).saturating_mul(1000) / bytes_per_second;
    estimate.max(min_ms)
}
