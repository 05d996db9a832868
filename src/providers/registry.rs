//! Provider registry keyed by [`ProviderKind`].
//!
//! Each provider is stored once per kind. At registration time providers
//! are wrapped, innermost first, in:
//!
//! 1. a per-attempt deadline (`tokio::time::timeout` on
//!    [`GenerationCall::timeout`]), so a hung upstream surfaces as the
//!    transient [`HuginnError::Timeout`];
//! 2. [`RetryingProvider`] when a [`RetryConfig`] is set.
//!
//! Cross-provider fallback is not handled here; the orchestrator decides
//! which model to try next.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{instrument, warn};

use super::retry::{RetryConfig, RetryingProvider};
use super::traits::{GenerationCall, GenerationProvider};
use crate::telemetry;
use crate::types::ProviderKind;
use crate::{HuginnError, Result};

/// Registry of generation providers, one per [`ProviderKind`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Registered>,
    retry_config: Option<RetryConfig>,
}

struct Registered {
    /// Deadline only.
    once: Arc<dyn GenerationProvider>,
    /// Deadline plus retry decoration, when configured.
    retrying: Arc<dyn GenerationProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry configuration.
    ///
    /// Providers registered after this call are wrapped in
    /// [`RetryingProvider`].
    pub fn set_retry_config(&mut self, config: RetryConfig) {
        self.retry_config = Some(config);
    }

    /// Register `provider` under its own [`kind`](GenerationProvider::kind),
    /// replacing any previous registration for that kind.
    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) {
        let kind = provider.kind();
        let once: Arc<dyn GenerationProvider> = Arc::new(Deadline { inner: provider });
        let retrying: Arc<dyn GenerationProvider> = match &self.retry_config {
            Some(config) => Arc::new(RetryingProvider::new(once.clone(), config.clone())),
            None => once.clone(),
        };
        self.providers.insert(kind, Registered { once, retrying });
    }

    /// The decorated provider registered for `kind`.
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn GenerationProvider>> {
        self.providers.get(&kind).map(|r| &r.retrying)
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Registered kinds, in [`ProviderKind::ALL`] order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }

    /// Dispatch `call` to the provider registered for `kind`, retrying
    /// transient failures when a retry policy is set.
    #[instrument(skip(self, call), fields(provider = %kind, model = %call.model))]
    pub async fn generate(&self, kind: ProviderKind, call: &GenerationCall) -> Result<String> {
        let provider = self.lookup(kind)?.retrying.clone();
        self.dispatch(kind, provider.as_ref(), call).await
    }

    /// Like [`generate`](Self::generate) but with exactly one attempt.
    #[instrument(skip(self, call), fields(provider = %kind, model = %call.model))]
    pub async fn generate_once(&self, kind: ProviderKind, call: &GenerationCall) -> Result<String> {
        let provider = self.lookup(kind)?.once.clone();
        self.dispatch(kind, provider.as_ref(), call).await
    }

    fn lookup(&self, kind: ProviderKind) -> Result<&Registered> {
        self.providers
            .get(&kind)
            .ok_or_else(|| HuginnError::NoProvider(kind.to_string()))
    }

    async fn dispatch(
        &self,
        kind: ProviderKind,
        provider: &dyn GenerationProvider,
        call: &GenerationCall,
    ) -> Result<String> {
        let start = Instant::now();
        let result = provider.generate(call).await;
        Self::record_request(kind.as_str(), start, result.is_ok());
        if let Err(e) = &result {
            warn!(
                provider = %kind,
                model = %call.model,
                latency_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "provider call failed"
            );
        }
        result
    }

    fn record_request(provider: &'static str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider,
        )
        .record(start.elapsed().as_secs_f64());
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.kinds())
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

/// Enforces [`GenerationCall::timeout`] on each attempt.
struct Deadline {
    inner: Arc<dyn GenerationProvider>,
}

#[async_trait]
impl GenerationProvider for Deadline {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }

    async fn generate(&self, call: &GenerationCall) -> Result<String> {
        tokio::time::timeout(call.timeout, self.inner.generate(call))
            .await
            .map_err(|_| HuginnError::Timeout(call.timeout))?
    }
}
