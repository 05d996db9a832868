use std::time::Duration;

use huginn::cache::{CacheLayer, Namespace, SetOptions};
use huginn::types::ProviderKind;
use huginn::{HuginnConfig, HuginnError};

const FULL: &str = r#"
[transport]
timeout_ms = 12000
max_attempts = 4
initial_delay_ms = 250
max_delay_ms = 4000
jitter = false

[cache]
prompt_ttl_secs = 600
prompt_max_entries = 50
sweep_interval_secs = 30

[cache.namespaces.translation]
ttl_secs = 7200
max_entries = 20

[providers.openai]
base_url = "http://localhost:8080"
api_key_env = "MY_OPENAI_KEY"

[providers.google]
enabled = false

[services]
context_snippets = 5

[services.translation]
target_language = "fil"

[services.search]
engine_id = "abc123"
"#;

#[test]
fn load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, FULL).unwrap();

    let config = HuginnConfig::load(Some(&path)).unwrap();

    assert_eq!(config.call_timeout(), Duration::from_secs(12));
    let retry = config.retry_config().unwrap();
    assert_eq!(retry.max_attempts, 4);
    assert_eq!(retry.initial_delay, Duration::from_millis(250));
    assert_eq!(retry.max_delay, Duration::from_secs(4));
    assert!(!retry.jitter);

    let cache = config.cache_config();
    assert_eq!(cache.prompt_ttl, Duration::from_secs(600));
    assert_eq!(cache.prompt_max_entries, 50);
    assert_eq!(cache.sweep_interval, Duration::from_secs(30));
    let translation = cache.namespaces.get(Namespace::Translation);
    assert_eq!(translation.ttl, Duration::from_secs(7200));
    assert_eq!(translation.max_entries, 20);

    assert_eq!(
        config.providers.openai.api_key_env.as_deref(),
        Some("MY_OPENAI_KEY")
    );
    assert_eq!(config.target_language(), "fil");
    assert_eq!(config.services.search.as_ref().unwrap().engine_id, "abc123");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HuginnConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, HuginnError::Configuration(_)));
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[transport\ntimeout_ms = ").unwrap();
    let err = HuginnConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn builder_registers_enabled_providers_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HuginnConfig::parse(FULL).unwrap();
    config.cache.durable_dir = Some(dir.path().to_path_buf());
    let huginn = config.builder().build().unwrap();

    assert_eq!(
        huginn.providers().kinds(),
        vec![ProviderKind::OpenAi, ProviderKind::Anthropic]
    );
    assert_eq!(config.durable_dir().as_deref(), Some(dir.path()));
}

#[test]
fn defaults_register_every_provider() {
    let mut config = HuginnConfig::default();
    config.cache.persist = false;
    let huginn = config.builder().build().unwrap();
    assert_eq!(huginn.providers().kinds(), ProviderKind::ALL.to_vec());
}

#[test]
fn zero_sweep_interval_is_rejected() {
    let err = HuginnConfig::parse("[cache]\nsweep_interval_secs = 0").unwrap_err();
    assert!(matches!(err, HuginnError::Configuration(ref m) if m.contains("sweep_interval_secs")));
}

#[test]
fn oversized_namespace_ttl_is_usable() {
    let config =
        HuginnConfig::parse("[cache.namespaces.search]\nttl_secs = 9223372036854775807").unwrap();
    let cache = CacheLayer::new(config.cache_config());
    cache
        .store()
        .set("query", &"snippet", SetOptions::new().namespace(Namespace::Search))
        .unwrap();
    assert_eq!(
        cache.store().get::<String>("query", Namespace::Search).as_deref(),
        Some("snippet")
    );
}
