//! End-to-end pipeline tests with in-process providers and services.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huginn::providers::{GenerationCall, GenerationProvider};
use huginn::services::{ContextSearch, SearchSnippet, Translation, Translator};
use huginn::{
    ERROR_SENTINEL, GenerationRequest, Huginn, HuginnError, Orchestrator, Priority,
    ProjectSettings, ProviderKind, Result, RetryConfig, TaskType,
};

// ============================================================================
// Mock providers and services
// ============================================================================

type Reply = Box<dyn Fn(&GenerationCall) -> Result<String> + Send + Sync>;

struct MockProvider {
    kind: ProviderKind,
    reply: Reply,
    delay: Duration,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    fn new(
        kind: ProviderKind,
        reply: impl Fn(&GenerationCall) -> Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply: Box::new(reply),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn answering(kind: ProviderKind, text: &'static str) -> Arc<Self> {
        Self::new(kind, move |_| Ok(text.to_string()))
    }

    fn failing(kind: ProviderKind) -> Arc<Self> {
        Self::new(kind, |_| Err(HuginnError::AuthenticationFailed))
    }

    fn slow(kind: ProviderKind, text: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply: Box::new(move |_| Ok(text.to_string())),
            delay,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, call: &GenerationCall) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(call.prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)(call)
    }
}

struct FakeTranslator {
    fail: bool,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn detect_language(&self, _text: &str) -> Result<String> {
        if self.fail {
            return Err(HuginnError::Http("translation service down".into()));
        }
        Ok("tl".into())
    }

    async fn translate(&self, _text: &str, _target: &str) -> Result<Translation> {
        Ok(Translation {
            text: "delicious".into(),
            source_language: "tl".into(),
        })
    }
}

struct FakeSearch {
    fail: bool,
    calls: AtomicU32,
}

impl FakeSearch {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ContextSearch for FakeSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchSnippet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(HuginnError::Api {
                status: 403,
                message: "quota".into(),
            });
        }
        Ok(vec![SearchSnippet {
            rank: 1,
            title: query.to_string(),
            snippet: "Filipino snack kiosk chain".into(),
            link: "https://example.test".into(),
        }])
    }
}

fn coding(input: &str) -> GenerationRequest {
    GenerationRequest::new(input)
        .task(TaskType::Coding)
        .settings(ProjectSettings::plain())
}

fn orchestrator(providers: &[Arc<MockProvider>]) -> Orchestrator {
    let mut builder = Huginn::builder().disable_retry();
    for p in providers {
        builder = builder.provider(p.clone());
    }
    builder.build().unwrap()
}

// ============================================================================
// Short-circuits
// ============================================================================

#[tokio::test]
async fn whitelisted_input_skips_providers() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "unused");
    let huginn = orchestrator(&[openai.clone()]);

    let result = huginn.generate(GenerationRequest::new("GCash")).await.unwrap();

    assert!(result.from_whitelist);
    assert_eq!(result.text, "GCash");
    assert_eq!(result.cost_usd, 0.0);
    assert_eq!(openai.calls(), 0);
}

#[tokio::test]
async fn repeated_input_is_served_from_cache() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "Service");
    let huginn = orchestrator(&[openai.clone()]);

    let first = huginn.generate(coding("fast delivery")).await.unwrap();
    assert!(!first.from_cache);
    assert!(first.cost_usd > 0.0);

    let second = huginn.generate(coding("fast delivery")).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.text, "Service");
    assert_eq!(second.cost_usd, 0.0);
    assert_eq!(openai.calls(), 1);
}

#[tokio::test]
async fn blank_input_is_rejected() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "x");
    let huginn = orchestrator(&[openai.clone()]);
    let err = huginn.generate(coding("   ")).await.unwrap_err();
    assert!(matches!(err, HuginnError::InvalidInput(_)));
    assert_eq!(openai.calls(), 0);
}

// ============================================================================
// Routing and fallback
// ============================================================================

#[tokio::test]
async fn primary_failure_falls_back_to_other_provider() {
    let openai = MockProvider::failing(ProviderKind::OpenAi);
    let anthropic = MockProvider::answering(ProviderKind::Anthropic, "Delivery");
    let huginn = orchestrator(&[openai.clone(), anthropic.clone()]);

    let result = huginn.generate(coding("fast delivery")).await.unwrap();

    assert_eq!(result.text, "Delivery");
    assert_eq!(result.model_used, "claude-3-5-haiku-latest");
    assert_eq!(result.provider_used, "anthropic");
    assert_eq!(openai.calls(), 1);
    assert_eq!(anthropic.calls(), 1);
}

#[tokio::test]
async fn fallback_failure_is_terminal_and_uncached() {
    let openai = MockProvider::failing(ProviderKind::OpenAi);
    let anthropic = MockProvider::new(ProviderKind::Anthropic, |_| {
        Err(HuginnError::Api {
            status: 500,
            message: "boom".into(),
        })
    });
    let huginn = orchestrator(&[openai.clone(), anthropic.clone()]);

    let err = huginn.generate(coding("fast delivery")).await.unwrap_err();
    assert!(matches!(err.root(), HuginnError::Api { status: 500, .. }));
    assert_eq!(anthropic.calls(), 1);
    assert_eq!(huginn.cache().stats().prompt.entries, 0);
}

#[tokio::test]
async fn unregistered_fallback_provider_is_reported() {
    let openai = MockProvider::failing(ProviderKind::OpenAi);
    let huginn = orchestrator(&[openai]);
    let err = huginn.generate(coding("fast delivery")).await.unwrap_err();
    assert!(matches!(err.root(), HuginnError::NoProvider(p) if p == "anthropic"));
}

#[tokio::test]
async fn sentinel_result_is_returned_without_fallback_or_caching() {
    let openai = MockProvider::new(ProviderKind::OpenAi, |_| {
        Ok(format!("{ERROR_SENTINEL} blocked by content filter"))
    });
    let anthropic = MockProvider::answering(ProviderKind::Anthropic, "unused");
    let huginn = orchestrator(&[openai.clone(), anthropic.clone()]);

    let result = huginn.generate(coding("fast delivery")).await.unwrap();
    assert!(result.is_error());
    assert_eq!(anthropic.calls(), 0);

    huginn.generate(coding("fast delivery")).await.unwrap();
    assert_eq!(openai.calls(), 2);
}

#[tokio::test]
async fn priority_changes_selected_model() {
    let google = MockProvider::answering(ProviderKind::Google, "Food");
    let huginn = orchestrator(&[google.clone()]);

    let result = huginn
        .generate(coding("fast delivery").priority(Priority::Fast))
        .await
        .unwrap();
    assert_eq!(result.model_used, "gemini-2.0-flash");
    assert_eq!(result.provider_used, "google");
}

// ============================================================================
// Evaluation
// ============================================================================

#[tokio::test]
async fn evaluation_is_attached_when_enabled() {
    let openai = MockProvider::new(ProviderKind::OpenAi, |call| {
        if call.prompt.contains("Proposed output") {
            Ok(r#"{"score": 0.9, "comments": "fits"}"#.into())
        } else {
            Ok("Service".into())
        }
    });
    let huginn = orchestrator(&[openai.clone()]);
    let request = GenerationRequest::new("fast delivery")
        .task(TaskType::Coding)
        .settings(ProjectSettings::plain().evaluator(true));

    let result = huginn.generate(request).await.unwrap();
    let evaluation = result.evaluation.expect("evaluation attached");
    assert!((evaluation.score - 0.9).abs() < 1e-6);
    assert_eq!(evaluation.comments, "fits");
    assert_eq!(openai.calls(), 2);
}

#[tokio::test]
async fn evaluation_failure_is_omitted_and_not_retried() {
    let openai = MockProvider::new(ProviderKind::OpenAi, |call| {
        if call.prompt.contains("Proposed output") {
            Err(HuginnError::Http("connection reset".into()))
        } else {
            Ok("Service".into())
        }
    });
    // Retry enabled: the evaluator must still make exactly one attempt.
    let huginn = Huginn::builder()
        .provider(openai.clone())
        .retry(
            RetryConfig::new()
                .max_attempts(3)
                .initial_delay(Duration::from_millis(1))
                .jitter(false),
        )
        .build()
        .unwrap();
    let request = GenerationRequest::new("fast delivery")
        .task(TaskType::Coding)
        .settings(ProjectSettings::plain().evaluator(true));

    let result = huginn.generate(request).await.unwrap();
    assert_eq!(result.text, "Service");
    assert!(result.evaluation.is_none());
    assert_eq!(openai.calls(), 2);
}

#[tokio::test]
async fn sentinel_results_are_not_evaluated() {
    let openai = MockProvider::new(ProviderKind::OpenAi, |_| Ok(format!("{ERROR_SENTINEL} empty")));
    let huginn = orchestrator(&[openai.clone()]);
    let request = GenerationRequest::new("fast delivery")
        .task(TaskType::Coding)
        .settings(ProjectSettings::plain().evaluator(true));

    let result = huginn.generate(request).await.unwrap();
    assert!(result.evaluation.is_none());
    assert_eq!(openai.calls(), 1);
}

// ============================================================================
// Enrichment
// ============================================================================

#[tokio::test]
async fn translation_is_added_to_prompt_and_result() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "Taste");
    let huginn = Huginn::builder()
        .disable_retry()
        .provider(openai.clone())
        .translator(Arc::new(FakeTranslator { fail: false }))
        .build()
        .unwrap();
    let request = GenerationRequest::new("masarap talaga")
        .task(TaskType::Coding)
        .settings(ProjectSettings::plain().auto_translate(true));

    let result = huginn.generate(request).await.unwrap();

    let translation = result.translation.expect("translated");
    assert_eq!(translation.translated, "delicious");
    assert_eq!(translation.source_language, "tl");
    assert!(openai.last_prompt().contains("Translation (tl -> en): delicious"));
}

#[tokio::test]
async fn translation_failure_degrades_to_original_input() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "Taste");
    let huginn = Huginn::builder()
        .disable_retry()
        .provider(openai.clone())
        .translator(Arc::new(FakeTranslator { fail: true }))
        .build()
        .unwrap();
    let request = GenerationRequest::new("masarap talaga")
        .task(TaskType::Coding)
        .settings(ProjectSettings::plain().auto_translate(true));

    let result = huginn.generate(request).await.unwrap();
    assert!(result.translation.is_none());
    assert_eq!(openai.last_prompt(), "Answer: masarap talaga");
}

#[tokio::test]
async fn adaptive_search_only_runs_for_capitalised_inputs() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "Snacks");
    let search = FakeSearch::new(false);
    let huginn = Huginn::builder()
        .disable_retry()
        .provider(openai.clone())
        .context_search(search.clone())
        .build()
        .unwrap();
    let settings = ProjectSettings::plain().web_context(true).adaptive_search(true);

    let plain = huginn
        .generate(coding("cheap snacks").settings(settings.clone()))
        .await
        .unwrap();
    assert!(!plain.context_used);
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);

    let named = huginn
        .generate(coding("I like Potato Corner").settings(settings))
        .await
        .unwrap();
    assert!(named.context_used);
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    let prompt = openai.last_prompt();
    assert!(prompt.contains("Web context:"));
    assert!(prompt.contains("1. I like Potato Corner: Filipino snack kiosk chain"));
}

#[tokio::test]
async fn search_failure_degrades_to_no_context() {
    let openai = MockProvider::answering(ProviderKind::OpenAi, "Snacks");
    let search = FakeSearch::new(true);
    let huginn = Huginn::builder()
        .disable_retry()
        .provider(openai.clone())
        .context_search(search.clone())
        .build()
        .unwrap();
    let settings = ProjectSettings::plain().web_context(true).adaptive_search(false);

    let result = huginn
        .generate(coding("cheap snacks").settings(settings))
        .await
        .unwrap();
    assert!(!result.context_used);
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Concurrency and batches
// ============================================================================

#[tokio::test]
async fn concurrent_identical_requests_share_one_call() {
    let openai = MockProvider::slow(ProviderKind::OpenAi, "Service", Duration::from_millis(50));
    let huginn = orchestrator(&[openai.clone()]);

    let (a, b) = tokio::join!(
        huginn.generate(coding("fast delivery")),
        huginn.generate(coding("fast delivery")),
    );

    assert_eq!(a.unwrap().text, "Service");
    assert_eq!(b.unwrap().text, "Service");
    assert_eq!(openai.calls(), 1);
}

#[tokio::test]
async fn coalesced_caller_reports_its_own_latency() {
    let openai = MockProvider::slow(ProviderKind::OpenAi, "Service", Duration::from_millis(400));
    let huginn = orchestrator(&[openai.clone()]);

    let (leader, follower) = tokio::join!(
        huginn.generate(coding("late joiner")),
        async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            huginn.generate(coding("late joiner")).await
        },
    );

    let (leader, follower) = (leader.unwrap(), follower.unwrap());
    assert_eq!(openai.calls(), 1);
    assert!(leader.latency_ms >= 400);
    assert!(follower.latency_ms < leader.latency_ms);
}

#[tokio::test]
async fn batch_preserves_request_order() {
    let openai = MockProvider::new(ProviderKind::OpenAi, |call| {
        Ok(format!("coded: {}", call.prompt.trim_start_matches("Answer: ")))
    });
    let huginn = orchestrator(&[openai.clone()]);
    let requests = vec![
        coding("cheap load"),
        coding(" "),
        coding("GCash"),
        coding("slow rider"),
    ];

    let results = huginn.generate_batch(requests).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().text, "coded: cheap load");
    assert!(matches!(results[1], Err(HuginnError::InvalidInput(_))));
    assert!(results[2].as_ref().unwrap().from_whitelist);
    assert_eq!(results[3].as_ref().unwrap().text, "coded: slow rider");
    assert_eq!(openai.calls(), 2);
}

#[tokio::test]
async fn empty_batch_is_empty() {
    let huginn = orchestrator(&[MockProvider::answering(ProviderKind::OpenAi, "x")]);
    assert!(huginn.generate_batch(Vec::new()).await.is_empty());
}
