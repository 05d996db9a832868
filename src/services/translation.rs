//! Language detection and translation.
//!
//! [`HttpTranslator`] speaks the Google Cloud Translation v2 REST shape:
//! `POST /language/translate/v2/detect` and `POST /language/translate/v2`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::providers::ApiKey;
use crate::providers::http;
use crate::{HuginnError, Result};

const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Output of a translation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    /// Language the service detected in the input.
    pub source_language: String,
}

/// Detects input language and translates text.
#[async_trait]
pub trait Translator: Send + Sync {
    /// ISO-639 code of `text`'s language (e.g. "tl", "en").
    async fn detect_language(&self, text: &str) -> Result<String>;

    /// Translate `text` into `target`.
    async fn translate(&self, text: &str, target: &str) -> Result<Translation>;
}

/// Google Translation v2 client.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    api_key: ApiKey,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTranslator {
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<ApiKey>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: http::client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let key = self.api_key.resolve("translation")?;
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .query(&[("key", key)])
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| http::send_error(e, self.timeout))?;
        let response = http::check_status(response, "translate").await?;
        http::json(response).await
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn detect_language(&self, text: &str) -> Result<String> {
        let body: DetectResponse = self
            .post("/language/translate/v2/detect", &DetectRequest { q: text })
            .await?;
        body.data
            .detections
            .into_iter()
            .flatten()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|d| d.language)
            .ok_or(HuginnError::EmptyResponse)
    }

    async fn translate(&self, text: &str, target: &str) -> Result<Translation> {
        let body: TranslateResponse = self
            .post(
                "/language/translate/v2",
                &TranslateRequest {
                    q: text,
                    target,
                    format: "text",
                },
            )
            .await?;
        let first = body
            .data
            .translations
            .into_iter()
            .next()
            .ok_or(HuginnError::EmptyResponse)?;
        Ok(Translation {
            text: first.translated_text,
            source_language: first.detected_source_language.unwrap_or_default(),
        })
    }
}

/// Whether two language tags name the same base language ("en-US" ~ "en").
pub fn same_language(a: &str, b: &str) -> bool {
    fn base(tag: &str) -> String {
        tag.split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
    base(a) == base(b)
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Deserialize)]
struct DetectData {
    #[serde(default)]
    detections: Vec<Vec<Detection>>,
}

#[derive(Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}
