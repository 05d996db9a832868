use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::durable::DurableStore;
use super::namespaced::{NamespaceStats, NamespacedCache, NamespacedCacheConfig};
use super::prompt::{DEFAULT_PROMPT_MAX_ENTRIES, DEFAULT_PROMPT_TTL, PromptCache, PromptCacheStats};
use super::whitelist::Whitelist;
use crate::telemetry;
use crate::types::GenerationResult;

/// Floor applied by [`CacheLayer::spawn_sweeper`].
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a [`CacheLayer`].
///
/// ```rust
/// # use huginn::cache::{CacheConfig, Namespace, NamespaceConfig};
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .prompt_ttl(Duration::from_secs(600))
///     .namespace(Namespace::Search, NamespaceConfig::new(Duration::from_secs(300), 50));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prompt-result TTL. Default: 1 hour.
    pub prompt_ttl: Duration,
    /// Prompt-result capacity. Default: 10,000.
    pub prompt_max_entries: usize,
    /// Interval used by [`CacheLayer::spawn_sweeper`] callers. Default: 5 minutes.
    pub sweep_interval: Duration,
    pub namespaces: NamespacedCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prompt_ttl: DEFAULT_PROMPT_TTL,
            prompt_max_entries: DEFAULT_PROMPT_MAX_ENTRIES,
            sweep_interval: Duration::from_secs(5 * 60),
            namespaces: NamespacedCacheConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt_ttl(mut self, ttl: Duration) -> Self {
        self.prompt_ttl = ttl;
        self
    }

    pub fn prompt_max_entries(mut self, n: usize) -> Self {
        self.prompt_max_entries = n;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Override one namespace's TTL and capacity.
    pub fn namespace(
        mut self,
        namespace: super::Namespace,
        config: super::NamespaceConfig,
    ) -> Self {
        self.namespaces = self.namespaces.namespace(namespace, config);
        self
    }
}

/// Combined occupancy snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub prompt: PromptCacheStats,
    pub namespaces: Vec<NamespaceStats>,
    pub custom_whitelist_entries: usize,
}

/// Facade over the whitelist, prompt cache and namespaced store.
#[derive(Debug)]
pub struct CacheLayer {
    whitelist: Whitelist,
    prompts: PromptCache,
    store: NamespacedCache,
    sweep_interval: Duration,
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheLayer {
    /// Memory-only cache layer.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            whitelist: Whitelist::new(),
            prompts: PromptCache::new(config.prompt_ttl, config.prompt_max_entries),
            store: NamespacedCache::new(config.namespaces),
            sweep_interval: config.sweep_interval,
        }
    }

    /// Cache layer whose durable namespaces mirror into `durable`.
    pub fn with_durable(config: CacheConfig, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            whitelist: Whitelist::new(),
            prompts: PromptCache::new(config.prompt_ttl, config.prompt_max_entries),
            store: NamespacedCache::with_durable(config.namespaces, durable),
            sweep_interval: config.sweep_interval,
        }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn prompts(&self) -> &PromptCache {
        &self.prompts
    }

    pub fn store(&self) -> &NamespacedCache {
        &self.store
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Whitelist short-circuit: a zero-cost result when `input` matches.
    pub fn check_whitelist(&self, input: &str) -> Option<GenerationResult> {
        let entry = self.whitelist.check(input)?;
        metrics::counter!(telemetry::WHITELIST_HITS_TOTAL).increment(1);
        debug!(input, entry = %entry, "whitelist match");
        Some(GenerationResult::whitelisted(entry))
    }

    /// Cached result for `input`, flagged `from_cache`.
    pub fn get_cached_result(&self, input: &str) -> Option<GenerationResult> {
        self.prompts.get(input).map(|mut result| {
            result.from_cache = true;
            result
        })
    }

    /// Store a generation result. Whitelist and error results are skipped.
    pub fn cache_result(&self, input: &str, result: &GenerationResult) -> bool {
        self.prompts.insert(input, result)
    }

    /// Purge expired entries in every store, returning the total removed.
    pub fn clean_expired(&self) -> usize {
        let removed = self.prompts.clean_expired() + self.store.clean_expired();
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Clear the prompt cache and every namespace. The whitelist is untouched.
    pub fn clear(&self) {
        self.prompts.clear();
        self.store.clear(None);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            prompt: self.prompts.stats(),
            namespaces: self.store.stats(),
            custom_whitelist_entries: self.whitelist.custom_entries().len(),
        }
    }

    /// Run [`clean_expired`](Self::clean_expired) every `interval` on the
    /// current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the layer is
    /// dropped. Abort the returned handle to stop it earlier. Intervals
    /// shorter than one second are raised to one second.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        if interval < MIN_SWEEP_INTERVAL {
            warn!(?interval, min = ?MIN_SWEEP_INTERVAL, "sweep interval too short, raising");
        }
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(layer) = weak.upgrade() else {
                    info!("cache layer dropped, sweeper exiting");
                    break;
                };
                layer.clean_expired();
            }
        })
    }
}
