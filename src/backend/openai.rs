//! OpenAI-compatible chat-completions backend.
//!
//! With `reflect` on, each request makes three calls: an initial translation, a critique
//! of it written for the target locale, and an improved translation that applies the
//! critique.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{TranslateRequest, Translator};
use crate::error::BackendError;
use crate::pipeline::prompts::{render_template, PromptSet, SYSTEM_REVIEWER, SYSTEM_TRANSLATOR};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub reflect: bool,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout: Duration::from_secs(120),
            temperature: 0.3,
            max_tokens: None,
            reflect: true,
        }
    }
}

pub struct OpenAiTranslator {
    http: reqwest::blocking::Client,
    settings: OpenAiSettings,
    api_key: Option<String>,
    prompts: PromptSet,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiTranslator {
    /// Reads the API key from `settings.api_key_env`. A missing key is allowed for local
    /// servers; the remote side answers 401 if it needs one.
    pub fn new(settings: OpenAiSettings, prompts: PromptSet) -> Result<Self, BackendError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;
        Ok(Self {
            http,
            settings,
            api_key,
            prompts,
        })
    }

    pub fn settings(&self) -> &OpenAiSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    fn chat(&self, system: &str, user: &str) -> Result<String, BackendError> {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.settings.temperature,
        });
        if let Some(max_tokens) = self.settings.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let mut req = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }
        let resp = req.send().map_err(|e| BackendError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .map_err(|e| BackendError::Request(format!("read response body: {e}")))?;
        if !(200..300).contains(&status) {
            return Err(classify_status(status, &text));
        }
        parse_chat_response(&text)
    }
}

/// Maps a non-success HTTP status to a backend error.
pub fn classify_status(status: u16, body: &str) -> BackendError {
    let message: String = body.trim().chars().take(300).collect();
    match status {
        401 | 403 => BackendError::Auth(message),
        429 => BackendError::RateLimited(message),
        _ => BackendError::Status { status, message },
    }
}

fn parse_chat_response(text: &str) -> Result<String, BackendError> {
    let parsed: ChatResponse = serde_json::from_str(text)
        .map_err(|e| BackendError::InvalidResponse(format!("decode chat response: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BackendError::InvalidResponse("response has no message content".into()))
}

impl Translator for OpenAiTranslator {
    fn name(&self) -> &str {
        &self.settings.model
    }

    fn translate(&self, req: &TranslateRequest<'_>) -> Result<String, BackendError> {
        let langs = req.languages;
        let base_vars = [
            ("source_lang", langs.source_lang.as_str()),
            ("target_lang", langs.target_lang.as_str()),
            ("country", langs.locale.as_str()),
            ("source_text", req.source_text),
        ];
        let system = render_template(SYSTEM_TRANSLATOR, &base_vars);
        let first = self.chat(&system, &render_template(&self.prompts.initial, &base_vars))?;
        if !self.settings.reflect {
            return Ok(first);
        }

        let mut vars = base_vars.to_vec();
        vars.push(("translation_1", first.as_str()));
        let reviewer = render_template(SYSTEM_REVIEWER, &vars);
        let reflection = self.chat(&reviewer, &render_template(&self.prompts.reflect, &vars))?;
        debug!(chars = reflection.len(), "reflection received");

        vars.push(("reflection", reflection.as_str()));
        self.chat(&reviewer, &render_template(&self.prompts.improve, &vars))
    }
}
