use async_trait::async_trait;
use linebridge_core::config::{TranslationStrategy, OPENAI_API_KEY};
use linebridge_core::models::TranslationResult;
use linebridge_core::text::classify_script;
use linebridge_core::Language;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::clients::{require_credential, ClientError, TranslateOptions, Translator};

const SERVICE: &str = "OpenAI";

const AUTO_TRANSLATE_PROMPT: &str = "You are a translator between English and Japanese. \
Work out which of the two languages the user's text is written in and translate it into the other one. \
Reply with the translation only: no quotes, notes, romanization or commentary.";

const IDENTIFY_PROMPT: &str = "Identify the language of the user's text. \
Answer with exactly one word, either English or Japanese.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions backed translator for the English/Japanese pair.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: String,
    endpoint: Url,
    model: String,
    strategy: TranslationStrategy,
}

impl OpenAiTranslator {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        endpoint: Url,
        model: String,
        strategy: TranslationStrategy,
    ) -> Self {
        Self {
            client,
            api_key,
            endpoint,
            model,
            strategy,
        }
    }

    async fn chat(
        &self,
        stage: &'static str,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
    ) -> Result<String, ClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
            max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                service: SERVICE,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(stage, status = %status, body = %body, "OpenAI API error");
            return Err(ClientError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| ClientError::Decode {
            service: SERVICE,
            detail: e.to_string(),
        })?;
        extract_content(chat)
    }

    async fn identify(&self, text: &str) -> Result<Language, ClientError> {
        let answer = self
            .chat(
                "identify",
                vec![ChatMessage::system(IDENTIFY_PROMPT), ChatMessage::user(text)],
                Some(5),
            )
            .await?;
        Ok(Language::from_label(&answer).unwrap_or_else(|| {
            let fallback = classify_script(text);
            warn!(answer = %answer, fallback = %fallback, "Unexpected language label, using script heuristic");
            fallback
        }))
    }

    async fn translate_directed(
        &self,
        text: &str,
        source: Language,
        target: Language,
        options: &TranslateOptions,
    ) -> Result<String, ClientError> {
        let prompt = directed_prompt(source, target, options);
        self.chat(
            "translate",
            vec![ChatMessage::system(prompt), ChatMessage::user(text)],
            None,
        )
        .await
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn ensure_configured(&self) -> Result<(), ClientError> {
        require_credential(&self.api_key, OPENAI_API_KEY)
    }

    async fn translate(
        &self,
        text: &str,
        options: &TranslateOptions,
    ) -> Result<TranslationResult, ClientError> {
        self.ensure_configured()?;

        let (detected, translated) = match (options.direction(), self.strategy) {
            (Some((source, target)), _) => {
                (source, self.translate_directed(text, source, target, options).await?)
            }
            (None, TranslationStrategy::TwoStep) => {
                let source = self.identify(text).await?;
                debug!(detected = %source, "Language identified");
                let translated = self
                    .translate_directed(text, source, source.opposite(), options)
                    .await?;
                (source, translated)
            }
            (None, TranslationStrategy::OneStep) => {
                let prompt = with_style(AUTO_TRANSLATE_PROMPT.to_string(), options);
                let translated = self
                    .chat(
                        "translate",
                        vec![ChatMessage::system(prompt), ChatMessage::user(text)],
                        None,
                    )
                    .await?;
                (classify_script(text), translated)
            }
        };

        info!(detected = %detected, chars = translated.chars().count(), "Translation complete");
        Ok(TranslationResult {
            translated_text: translated,
            detected_language: detected,
        })
    }
}

fn extract_content(chat: ChatResponse) -> Result<String, ClientError> {
    chat.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ClientError::Decode {
            service: SERVICE,
            detail: "empty completion".into(),
        })
}

fn directed_prompt(source: Language, target: Language, options: &TranslateOptions) -> String {
    let base = format!(
        "Translate the user's text from {source} into natural {target}. \
         Reply with the translation only: no quotes, notes, romanization or commentary."
    );
    with_style(base, options)
}

fn with_style(mut prompt: String, options: &TranslateOptions) -> String {
    if let Some(formality) = options.formality {
        prompt.push(' ');
        prompt.push_str(formality.instruction());
    }
    if let Some(pronouns) = options.speaker_pronouns.as_deref().filter(|p| !p.is_empty()) {
        prompt.push_str(&format!(" The speaker uses {pronouns} pronouns."));
    }
    if let Some(pronouns) = options.listener_pronouns.as_deref().filter(|p| !p.is_empty()) {
        prompt.push_str(&format!(" The listener uses {pronouns} pronouns."));
    }
    prompt
}
