//! Upstream text-generation providers.
//!
//! One [`GenerationProvider`] implementation per [`ProviderKind`]:
//!
//! - [`OpenAiProvider`]: chat completions
//! - [`AnthropicProvider`]: messages
//! - [`GoogleProvider`]: Gemini `generateContent`
//!
//! [`ProviderRegistry`] dispatches by kind and applies the per-call timeout
//! and optional [`RetryingProvider`] decoration.
//!
//! [`ProviderKind`]: crate::types::ProviderKind

mod anthropic;
mod credentials;
mod google;
pub(crate) mod http;
mod openai;
pub mod registry;
pub mod retry;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use credentials::ApiKey;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;
pub use retry::{RetryConfig, RetryingProvider};
pub use traits::{DEFAULT_CALL_TIMEOUT, GenerationCall, GenerationProvider};
