//! Provider trait for upstream text generation.
//!
//! Each upstream API gets one [`GenerationProvider`] implementation.
//! Implementations return the completion text verbatim, or text carrying
//! [`ERROR_SENTINEL`](crate::types::ERROR_SENTINEL) when the upstream
//! answered but produced nothing usable (safety block, no candidates).
//! Transport and status failures are `Err`.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::types::ProviderKind;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A single completion request as sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for the whole HTTP exchange.
    pub timeout: Duration,
}

impl GenerationCall {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Upstream text-generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Which upstream this provider talks to.
    fn kind(&self) -> ProviderKind;

    /// Run one completion.
    async fn generate(&self, call: &GenerationCall) -> Result<String>;
}
