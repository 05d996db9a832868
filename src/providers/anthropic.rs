//! Anthropic messages client.
//!
//! See: <https://docs.anthropic.com/en/api/messages>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::credentials::ApiKey;
use super::http;
use super::traits::{GenerationCall, GenerationProvider};
use crate::Result;
use crate::types::{ERROR_SENTINEL, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Client for the Anthropic `/v1/messages` endpoint.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_key: ApiKey,
    http: Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Key read from `ANTHROPIC_API_KEY` on every call.
    pub fn from_env() -> Self {
        Self::new(ApiKey::from_env(ProviderKind::Anthropic.default_key_env()))
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
impl GenerationProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn generate(&self, call: &GenerationCall) -> Result<String> {
        let key = self.api_key.resolve(self.name())?;
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .timeout(call.timeout)
            .json(&MessagesRequest {
                model: &call.model,
                max_tokens: call.max_tokens,
                temperature: call.temperature,
                system: call.system_prompt.as_deref(),
                messages: [UserMessage {
                    role: "user",
                    content: &call.prompt,
                }],
            })
            .send()
            .await
            .map_err(|e| http::send_error(e, call.timeout))?;

        let response = http::check_status(response, &call.model).await?;
        let body: MessagesResponse = http::json(response).await?;
        Ok(extract_text(body))
    }
}

fn extract_text(body: MessagesResponse) -> String {
    if body.stop_reason.as_deref() == Some("refusal") {
        return format!("{ERROR_SENTINEL} refused by model");
    }
    let text: String = body
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        format!("{ERROR_SENTINEL} empty completion")
    } else {
        text
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
