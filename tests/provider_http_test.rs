//! Wiremock integration tests for the HTTP providers.
//!
//! These verify request shape, credential headers and the mapping of
//! upstream responses onto results, sentinel text and typed errors.

use std::time::Duration;

use huginn::providers::{
    AnthropicProvider, ApiKey, GenerationCall, GenerationProvider, GoogleProvider, OpenAiProvider,
};
use huginn::{ERROR_SENTINEL, HuginnError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn call(model: &str) -> GenerationCall {
    GenerationCall::new(model, "Answer: fast delivery")
        .system_prompt("Code the answer.")
        .temperature(0.2)
        .max_tokens(64)
}

// ============================================================================
// OpenAI
// ============================================================================

#[tokio::test]
async fn openai_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 64,
            "messages": [
                {"role": "system", "content": "Code the answer."},
                {"role": "user", "content": "Answer: fast delivery"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Service"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-test", server.uri());
    let text = provider.generate(&call("gpt-4o-mini")).await.unwrap();
    assert_eq!(text, "Service");
}

#[tokio::test]
async fn openai_content_filter_returns_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-test", server.uri());
    let text = provider.generate(&call("gpt-4o-mini")).await.unwrap();
    assert!(text.starts_with(ERROR_SENTINEL));
}

#[tokio::test]
async fn openai_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-wrong", server.uri());
    let err = provider.generate(&call("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(err, HuginnError::AuthenticationFailed));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn openai_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url("sk-test", server.uri());
    let err = provider.generate(&call("gpt-4o-mini")).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn missing_env_key_fails_before_any_request() {
    let server = MockServer::start().await;
    let provider = OpenAiProvider::with_base_url(
        ApiKey::from_env("HUGINN_TEST_SURELY_UNSET_KEY"),
        server.uri(),
    );
    let err = provider.generate(&call("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(err, HuginnError::MissingCredential(p) if p == "openai"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Anthropic
// ============================================================================

#[tokio::test]
async fn anthropic_success_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-5-haiku-latest",
            "system": "Code the answer.",
            "max_tokens": 64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Delivery"},
                {"type": "text", "text": " speed"}
            ],
            "stop_reason": "end_turn"
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("ak-test", server.uri());
    let text = provider
        .generate(&call("claude-3-5-haiku-latest"))
        .await
        .unwrap();
    assert_eq!(text, "Delivery speed");
}

#[tokio::test]
async fn anthropic_overloaded_is_transient_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("ak-test", server.uri());
    let err = provider
        .generate(&call("claude-3-5-haiku-latest"))
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Api { status: 529, ref message } if message == "overloaded"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn anthropic_empty_content_returns_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [], "stop_reason": "end_turn"})),
        )
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url("ak-test", server.uri());
    let text = provider
        .generate(&call("claude-3-5-haiku-latest"))
        .await
        .unwrap();
    assert!(text.starts_with(ERROR_SENTINEL));
}

// ============================================================================
// Google
// ============================================================================

#[tokio::test]
async fn google_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Code the answer."}]},
            "generationConfig": {"maxOutputTokens": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Logistics"}]},
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("g-test", server.uri());
    let text = provider.generate(&call("gemini-2.0-flash")).await.unwrap();
    assert_eq!(text, "Logistics");
}

#[tokio::test]
async fn google_safety_block_returns_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        })))
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("g-test", server.uri());
    let text = provider.generate(&call("gemini-2.0-flash")).await.unwrap();
    assert!(text.starts_with(ERROR_SENTINEL));
    assert!(text.contains("SAFETY"));
}

#[tokio::test]
async fn google_prompt_block_returns_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "OTHER"}
        })))
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("g-test", server.uri());
    let text = provider.generate(&call("gemini-2.0-flash")).await.unwrap();
    assert!(text.starts_with(ERROR_SENTINEL));
}

#[tokio::test]
async fn google_unknown_model_is_model_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("g-test", server.uri());
    let err = provider.generate(&call("gemini-9")).await.unwrap_err();
    assert!(matches!(err, HuginnError::ModelNotFound(m) if m == "gemini-9"));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({"candidates": []})),
        )
        .mount(&server)
        .await;

    let provider = GoogleProvider::with_base_url("g-test", server.uri());
    let err = provider
        .generate(&call("gemini-2.0-flash").timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Timeout(_)));
}
