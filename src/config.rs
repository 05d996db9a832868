//! File-based configuration.
//!
//! `HuginnConfig` is read from TOML. Every section is optional; a missing
//! file yields the defaults. Credentials are never stored in the file:
//! each provider names the environment variable holding its key, resolved
//! on every call.
//!
//! ```toml
//! [transport]
//! timeout_ms = 20000
//! max_attempts = 2
//!
//! [cache]
//! prompt_ttl_secs = 1800
//! durable_dir = "/var/cache/huginn"
//!
//! [cache.namespaces.search]
//! ttl_secs = 600
//! max_entries = 100
//!
//! [providers.anthropic]
//! enabled = false
//!
//! [services.search]
//! engine_id = "0123456789abcdef"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheConfig, FileStore, Namespace, NamespaceConfig};
use crate::orchestrator::{Huginn, HuginnBuilder};
use crate::providers::{
    AnthropicProvider, ApiKey, GoogleProvider, OpenAiProvider, RetryConfig,
};
use crate::services::{HttpContextSearch, HttpTranslator};
use crate::types::ProviderKind;
use crate::{HuginnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HuginnConfig {
    pub transport: TransportConfig,
    pub cache: CacheSection,
    pub providers: ProvidersConfig,
    pub services: ServicesConfig,
}

/// Per-call deadline and retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub prompt_ttl_secs: u64,
    pub prompt_max_entries: usize,
    pub sweep_interval_secs: u64,
    /// Mirror durable namespaces to disk.
    pub persist: bool,
    /// Defaults to the platform cache directory (`~/.cache/huginn`).
    pub durable_dir: Option<PathBuf>,
    pub namespaces: BTreeMap<Namespace, NamespaceSection>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            prompt_ttl_secs: 3600,
            prompt_max_entries: 10_000,
            sweep_interval_secs: 300,
            persist: true,
            durable_dir: None,
            namespaces: BTreeMap::new(),
        }
    }
}

/// Partial override of one namespace; unset fields keep the built-in value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct NamespaceSection {
    pub ttl_secs: Option<u64>,
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderSection,
    pub anthropic: ProviderSection,
    pub google: ProviderSection,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSection {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub enabled: bool,
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    pub api_key_env: Option<String>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub translation: Option<TranslationSection>,
    pub search: Option<SearchSection>,
    /// Web snippets appended to each prompt.
    pub context_snippets: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationSection {
    pub base_url: Option<String>,
    pub api_key_env: String,
    /// Default target language for requests built from this config.
    pub target_language: String,
}

impl Default for TranslationSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "GOOGLE_API_KEY".into(),
            target_language: "en".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub engine_id: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "GOOGLE_API_KEY".into(),
            engine_id: String::new(),
        }
    }
}

impl HuginnConfig {
    /// Load configuration.
    ///
    /// Resolution order:
    /// 1. `explicit` (must exist)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    ///
    /// Falls back to defaults when neither standard location exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match Self::resolve_path(explicit)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    fn validate(&self) -> Result<()> {
        if self.transport.timeout_ms == 0 {
            return Err(HuginnError::Configuration(
                "transport.timeout_ms must be non-zero".into(),
            ));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(HuginnError::Configuration(
                "cache.sweep_interval_secs must be non-zero".into(),
            ));
        }
        if let Some(search) = &self.services.search
            && search.engine_id.trim().is_empty()
        {
            return Err(HuginnError::Configuration(
                "services.search.engine_id is required".into(),
            ));
        }
        Ok(())
    }

    /// Retry policy from `[transport]`. One attempt disables retry.
    pub fn retry_config(&self) -> Option<RetryConfig> {
        let t = &self.transport;
        (t.max_attempts > 1).then(|| {
            RetryConfig::new()
                .max_attempts(t.max_attempts)
                .initial_delay(Duration::from_millis(t.initial_delay_ms))
                .max_delay(Duration::from_millis(t.max_delay_ms))
                .jitter(t.jitter)
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.timeout_ms)
    }

    /// Cache settings from `[cache]`, with namespace overrides applied on top
    /// of the built-in defaults.
    pub fn cache_config(&self) -> CacheConfig {
        let c = &self.cache;
        let mut config = CacheConfig::new()
            .prompt_ttl(Duration::from_secs(c.prompt_ttl_secs))
            .prompt_max_entries(c.prompt_max_entries)
            .sweep_interval(Duration::from_secs(c.sweep_interval_secs));
        for (&namespace, section) in &c.namespaces {
            let base = config.namespaces.get(namespace);
            let ttl = section.ttl_secs.map_or(base.ttl, Duration::from_secs);
            let max_entries = section.max_entries.unwrap_or(base.max_entries);
            config = config.namespace(namespace, NamespaceConfig::new(ttl, max_entries));
        }
        config
    }

    /// Durable store directory, if persistence is on.
    pub fn durable_dir(&self) -> Option<PathBuf> {
        if !self.cache.persist {
            return None;
        }
        self.cache
            .durable_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("huginn")))
    }

    /// Default target language for new requests.
    pub fn target_language(&self) -> &str {
        self.services
            .translation
            .as_ref()
            .map_or("en", |t| t.target_language.as_str())
    }

    /// A builder with every configured provider, service and cache setting
    /// applied. Callers may keep customising it before `build()`.
    pub fn builder(&self) -> HuginnBuilder {
        let mut builder = Huginn::builder()
            .call_timeout(self.call_timeout())
            .cache_config(self.cache_config());

        builder = match self.retry_config() {
            Some(retry) => builder.retry(retry),
            None => builder.disable_retry(),
        };

        for kind in ProviderKind::ALL {
            let section = self.providers.get(kind);
            if !section.enabled {
                continue;
            }
            let key = ApiKey::from_env(
                section
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| kind.default_key_env().to_string()),
            );
            builder = match (kind, &section.base_url) {
                (ProviderKind::OpenAi, Some(url)) => {
                    builder.provider(Arc::new(OpenAiProvider::with_base_url(key, url)))
                }
                (ProviderKind::OpenAi, None) => builder.provider(Arc::new(OpenAiProvider::new(key))),
                (ProviderKind::Anthropic, Some(url)) => {
                    builder.provider(Arc::new(AnthropicProvider::with_base_url(key, url)))
                }
                (ProviderKind::Anthropic, None) => {
                    builder.provider(Arc::new(AnthropicProvider::new(key)))
                }
                (ProviderKind::Google, Some(url)) => {
                    builder.provider(Arc::new(GoogleProvider::with_base_url(key, url)))
                }
                (ProviderKind::Google, None) => builder.provider(Arc::new(GoogleProvider::new(key))),
            };
        }

        if let Some(t) = &self.services.translation {
            let key = ApiKey::from_env(t.api_key_env.clone());
            let translator = match &t.base_url {
                Some(url) => HttpTranslator::with_base_url(key, url),
                None => HttpTranslator::new(key),
            };
            builder = builder.translator(Arc::new(translator));
        }
        if let Some(s) = &self.services.search {
            let key = ApiKey::from_env(s.api_key_env.clone());
            let search = match &s.base_url {
                Some(url) => HttpContextSearch::with_base_url(key, &s.engine_id, url),
                None => HttpContextSearch::new(key, &s.engine_id),
            };
            builder = builder.context_search(Arc::new(search));
        }
        if let Some(n) = self.services.context_snippets {
            builder = builder.context_snippets(n);
        }

        if let Some(dir) = self.durable_dir() {
            builder = builder.durable_store(Arc::new(FileStore::new(dir)));
        }
        builder
    }
}
