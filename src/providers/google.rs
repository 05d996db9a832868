//! Google Gemini `generateContent` client.
//!
//! See: <https://ai.google.dev/api/generate-content>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::credentials::ApiKey;
use super::http;
use super::traits::{GenerationCall, GenerationProvider};
use crate::Result;
use crate::types::{ERROR_SENTINEL, ProviderKind};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for Gemini models.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    api_key: ApiKey,
    http: Client,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Key read from `GOOGLE_API_KEY` on every call.
    pub fn from_env() -> Self {
        Self::new(ApiKey::from_env(ProviderKind::Google.default_key_env()))
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
impl GenerationProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn generate(&self, call: &GenerationCall) -> Result<String> {
        let key = self.api_key.resolve(self.name())?;
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &call.prompt,
                }],
            }],
            system_instruction: call.system_prompt.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: call.temperature,
                max_output_tokens: call.max_tokens,
            },
        };

        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, call.model
            ))
            .header("x-goog-api-key", key)
            .timeout(call.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::send_error(e, call.timeout))?;

        let response = http::check_status(response, &call.model).await?;
        let body: GenerateContentResponse = http::json(response).await?;
        Ok(extract_text(body))
    }
}

fn extract_text(body: GenerateContentResponse) -> String {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return format!("{ERROR_SENTINEL} prompt blocked: {reason}");
    }
    let Some(candidate) = body.candidates.into_iter().next() else {
        return format!("{ERROR_SENTINEL} no candidates returned");
    };
    if matches!(
        candidate.finish_reason.as_deref(),
        Some("SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "RECITATION")
    ) {
        return format!(
            "{ERROR_SENTINEL} candidate blocked: {}",
            candidate.finish_reason.unwrap_or_default()
        );
    }
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        format!("{ERROR_SENTINEL} empty completion")
    } else {
        text
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
