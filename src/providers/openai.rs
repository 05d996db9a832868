//! OpenAI chat-completions client.
//!
//! See: <https://platform.openai.com/docs/api-reference/chat/create>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::credentials::ApiKey;
use super::http;
use super::traits::{GenerationCall, GenerationProvider};
use crate::Result;
use crate::types::{ERROR_SENTINEL, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: ApiKey,
    http: Client,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Key read from `OPENAI_API_KEY` on every call.
    pub fn from_env() -> Self {
        Self::new(ApiKey::from_env(ProviderKind::OpenAi.default_key_env()))
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<ApiKey>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: http::client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(&self, call: &GenerationCall) -> Result<String> {
        let key = self.api_key.resolve(self.name())?;
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &call.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &call.prompt,
        });

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(key)
            .timeout(call.timeout)
            .json(&ChatRequest {
                model: &call.model,
                messages,
                temperature: call.temperature,
                max_tokens: call.max_tokens,
            })
            .send()
            .await
            .map_err(|e| http::send_error(e, call.timeout))?;

        let response = http::check_status(response, &call.model).await?;
        let body: ChatResponse = http::json(response).await?;
        Ok(extract_text(body))
    }
}

fn extract_text(body: ChatResponse) -> String {
    let Some(choice) = body.choices.into_iter().next() else {
        return format!("{ERROR_SENTINEL} no choices returned");
    };
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return format!("{ERROR_SENTINEL} blocked by content filter");
    }
    if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
        return format!("{ERROR_SENTINEL} refused: {refusal}");
    }
    match choice.message.content {
        Some(text) if !text.trim().is_empty() => text,
        _ => format!("{ERROR_SENTINEL} empty completion"),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}
