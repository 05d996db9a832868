//! Model registry records and provider identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::HuginnError;

/// Upstream text-generation provider.
///
/// Dispatch over providers always matches on this enum, so adding a provider
/// is a compile error everywhere it has to be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
}

impl ProviderKind {
    /// All providers, in registration order.
    pub const ALL: [ProviderKind; 3] = [Self::OpenAi, Self::Anthropic, Self::Google];

    /// Provider tag used in logs, metrics and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    /// Default environment variable holding the provider's API key.
    pub fn default_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = HuginnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            other => Err(HuginnError::InvalidInput(format!("unknown provider: {other}"))),
        }
    }
}

/// Immutable registry record for a routable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier as sent to the provider (e.g. "gpt-4o-mini").
    pub id: String,
    /// Provider serving the model.
    pub provider: ProviderKind,
    /// Blended cost per million tokens (USD).
    pub cost_per_1m_tokens: f64,
    /// Typical end-to-end latency for a short completion.
    pub avg_latency_ms: u64,
    /// Subjective quality score, 0–10.
    pub quality_score: f32,
}
