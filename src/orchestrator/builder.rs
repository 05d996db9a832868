//! Builder for configuring orchestrator instances

use std::sync::Arc;
use std::time::Duration;

use super::Orchestrator;
use crate::cache::{CacheConfig, CacheLayer, DurableStore};
use crate::providers::{
    AnthropicProvider, ApiKey, DEFAULT_CALL_TIMEOUT, GenerationProvider, GoogleProvider,
    OpenAiProvider, ProviderRegistry, RetryConfig,
};
use crate::router::ModelRouter;
use crate::services::{ContextSearch, Translator};
use crate::{HuginnError, Result};

/// Web snippets appended to a prompt by default.
const DEFAULT_CONTEXT_SNIPPETS: usize = 3;

/// Main entry point for creating orchestrator instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the orchestrator.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Builder for configuring orchestrator instances.
///
/// ```rust,no_run
/// # use huginn::Huginn;
/// # use std::time::Duration;
/// let huginn = Huginn::builder()
///     .openai_from_env()
///     .google("AIza...")
///     .call_timeout(Duration::from_secs(20))
///     .build()?;
/// # Ok::<(), huginn::HuginnError>(())
/// ```
pub struct HuginnBuilder {
    providers: Vec<Arc<dyn GenerationProvider>>,
    retry: Option<RetryConfig>,
    call_timeout: Duration,
    translator: Option<Arc<dyn Translator>>,
    search: Option<Arc<dyn ContextSearch>>,
    context_snippets: usize,
    cache: Option<Arc<CacheLayer>>,
    cache_config: CacheConfig,
    durable: Option<Arc<dyn DurableStore>>,
    router: Option<ModelRouter>,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            retry: Some(RetryConfig::default()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            translator: None,
            search: None,
            context_snippets: DEFAULT_CONTEXT_SNIPPETS,
            cache: None,
            cache_config: CacheConfig::default(),
            durable: None,
            router: None,
        }
    }

    /// Configure OpenAI with a literal key or [`ApiKey::Env`].
    pub fn openai(self, api_key: impl Into<ApiKey>) -> Self {
        self.provider(Arc::new(OpenAiProvider::new(api_key)))
    }

    /// Configure OpenAI reading `OPENAI_API_KEY` on every call.
    pub fn openai_from_env(self) -> Self {
        self.provider(Arc::new(OpenAiProvider::from_env()))
    }

    /// Configure Anthropic with a literal key or [`ApiKey::Env`].
    pub fn anthropic(self, api_key: impl Into<ApiKey>) -> Self {
        self.provider(Arc::new(AnthropicProvider::new(api_key)))
    }

    /// Configure Anthropic reading `ANTHROPIC_API_KEY` on every call.
    pub fn anthropic_from_env(self) -> Self {
        self.provider(Arc::new(AnthropicProvider::from_env()))
    }

    /// Configure Google (Gemini) with a literal key or [`ApiKey::Env`].
    pub fn google(self, api_key: impl Into<ApiKey>) -> Self {
        self.provider(Arc::new(GoogleProvider::new(api_key)))
    }

    /// Configure Google reading `GOOGLE_API_KEY` on every call.
    pub fn google_from_env(self) -> Self {
        self.provider(Arc::new(GoogleProvider::from_env()))
    }

    /// Register any provider. A later provider of the same kind replaces an
    /// earlier one.
    pub fn provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Retry policy for transient provider errors (default: 3 attempts).
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Disable same-provider retries. Cross-provider fallback still applies.
    pub fn disable_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Deadline for each provider attempt (default: 30s).
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Enable auto-translation through `translator`.
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Enable web-context enrichment through `search`.
    pub fn context_search(mut self, search: Arc<dyn ContextSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Number of web snippets appended to the prompt (default: 3).
    pub fn context_snippets(mut self, n: usize) -> Self {
        self.context_snippets = n;
        self
    }

    /// Share an existing cache layer. Overrides `cache_config` and
    /// `durable_store`.
    pub fn cache(mut self, cache: Arc<CacheLayer>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Mirror durable cache namespaces into `store`.
    pub fn durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Route with a custom model table instead of the built-in one.
    pub fn router(mut self, router: ModelRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Build the orchestrator.
    ///
    /// Fails with [`HuginnError::NoProvider`] when no provider is configured.
    pub fn build(self) -> Result<Orchestrator> {
        if self.providers.is_empty() {
            return Err(HuginnError::NoProvider("no generation provider configured".into()));
        }
        if self.call_timeout.is_zero() {
            return Err(HuginnError::Configuration("call timeout must be non-zero".into()));
        }

        let mut registry = ProviderRegistry::new();
        if let Some(retry) = self.retry {
            registry.set_retry_config(retry);
        }
        for provider in self.providers {
            registry.register(provider);
        }

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(match self.durable {
                Some(store) => CacheLayer::with_durable(self.cache_config, store),
                None => CacheLayer::new(self.cache_config),
            })
        });

        Ok(Orchestrator {
            cache,
            router: self.router.unwrap_or_default(),
            providers: registry,
            translator: self.translator,
            search: self.search,
            call_timeout: self.call_timeout,
            context_snippets: self.context_snippets.max(1),
            inflight: moka::future::Cache::builder().max_capacity(10_000).build(),
        })
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;

    #[test]
    fn build_without_providers_fails() {
        let err = Huginn::builder().build().unwrap_err();
        assert!(matches!(err, HuginnError::NoProvider(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Huginn::builder()
            .openai("sk-test")
            .call_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, HuginnError::Configuration(_)));
    }

    #[test]
    fn registers_one_provider_per_kind() {
        let huginn = Huginn::builder()
            .openai("a")
            .openai("b")
            .google("c")
            .build()
            .unwrap();
        assert_eq!(
            huginn.providers().kinds(),
            vec![ProviderKind::OpenAi, ProviderKind::Google]
        );
    }
}
