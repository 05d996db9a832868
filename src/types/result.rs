//! Generation result types.

use serde::{Deserialize, Serialize};

/// Marker placed in result text when a provider answered but produced no
/// usable completion (safety block, empty candidate list). Results carrying
/// it are never cached or evaluated.
pub const ERROR_SENTINEL: &str = "[huginn:error]";

/// Provider tag reported for whitelist short-circuits.
pub(crate) const WHITELIST_ORIGIN: &str = "whitelist";

/// Translation performed on the input before generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationInfo {
    pub original: String,
    pub translated: String,
    pub source_language: String,
    pub target_language: String,
}

/// Evaluator verdict on a generated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Quality rating in `[0.0, 1.0]`.
    pub score: f32,
    #[serde(default)]
    pub comments: String,
}

/// Normalised outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub text: String,
    pub model_used: String,
    pub provider_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationInfo>,
    #[serde(default)]
    pub context_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(default)]
    pub from_whitelist: bool,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

impl GenerationResult {
    /// A freshly generated result with no enrichment recorded yet.
    pub fn generated(
        text: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            model_used: model.into(),
            provider_used: provider.into(),
            translation: None,
            context_used: false,
            evaluation: None,
            from_whitelist: false,
            from_cache: false,
            latency_ms: 0,
            cost_usd: 0.0,
        }
    }

    /// Zero-cost result for a whitelist match.
    pub fn whitelisted(entry: impl Into<String>) -> Self {
        Self {
            from_whitelist: true,
            ..Self::generated(entry, WHITELIST_ORIGIN, WHITELIST_ORIGIN)
        }
    }

    /// Whether the text carries the provider error sentinel.
    pub fn is_error(&self) -> bool {
        self.text.contains(ERROR_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelisted_result_is_free_and_flagged() {
        let result = GenerationResult::whitelisted("GCash");
        assert_eq!(result.text, "GCash");
        assert!(result.from_whitelist);
        assert!(!result.from_cache);
        assert_eq!(result.cost_usd, 0.0);
        assert_eq!(result.provider_used, "whitelist");
    }

    #[test]
    fn sentinel_marks_error() {
        let ok = GenerationResult::generated("Banking", "gpt-4o-mini", "openai");
        let err = GenerationResult::generated(
            format!("{ERROR_SENTINEL} blocked by safety filter"),
            "gemini-2.0-flash",
            "google",
        );
        assert!(!ok.is_error());
        assert!(err.is_error());
    }

    #[test]
    fn serialises_camel_case() {
        let result = GenerationResult::generated("x", "m", "p");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["modelUsed"], "m");
        assert_eq!(json["fromCache"], false);
        assert!(json.get("evaluation").is_none());
    }
}
