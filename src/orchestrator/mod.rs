//! The generation request pipeline.
//!
//! [`Orchestrator::generate`] runs every request through the same strictly
//! ordered stages:
//!
//! ```text
//!  whitelist ──hit──► return (cost 0, from_whitelist)
//!      │
//!  prompt cache ──hit──► return (from_cache)
//!      │
//!  ┌── in-flight de-duplication (identical concurrent requests share one run)
//!  │   translate        (auto-translate on, input not in target language)
//!  │   web context      (enabled; adaptive mode needs a capitalised token)
//!  │   select model     (ModelRouter, task × priority)
//!  │   provider call ──fail──► one fallback on a different provider
//!  │   evaluate         (optional, non-error results only)
//!  └── cache write + latency + cost
//! ```
//!
//! Translation, web context and evaluation are best-effort: their failures
//! are logged and the pipeline continues without them. A failed fallback
//! call is terminal and nothing is cached.

mod builder;
pub mod prompt;

pub use builder::{Huginn, HuginnBuilder};

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheLayer, Namespace, SetOptions};
use crate::providers::{GenerationCall, ProviderRegistry};
use crate::router::ModelRouter;
use crate::services::best_effort;
use crate::services::{ContextSearch, Translator};
use crate::telemetry;
use crate::types::{Evaluation, GenerationRequest, GenerationResult, Priority, TaskType};
use crate::{HuginnError, Result};

/// Upper bound on evaluator output.
const EVALUATION_MAX_TOKENS: u32 = 200;

/// Wires the cache layer, router, providers and enrichment services into
/// the generation pipeline.
///
/// Build one with [`Huginn::builder()`]. Cheap to share behind an `Arc`.
pub struct Orchestrator {
    cache: Arc<CacheLayer>,
    router: ModelRouter,
    providers: ProviderRegistry,
    translator: Option<Arc<dyn Translator>>,
    search: Option<Arc<dyn ContextSearch>>,
    call_timeout: Duration,
    context_snippets: usize,
    inflight: moka::future::Cache<String, GenerationResult>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("translator", &self.translator.is_some())
            .field("search", &self.search.is_some())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Start the periodic cache sweeper at the configured interval.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.cache.spawn_sweeper(self.cache.sweep_interval())
    }

    /// Run one request through the pipeline.
    ///
    /// Errors only when both the primary and the fallback provider call
    /// fail, or when the input is blank.
    #[instrument(skip_all, fields(task = %request.task, priority = %request.priority))]
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let start = Instant::now();
        if request.input.trim().is_empty() {
            return Err(HuginnError::InvalidInput("input is empty".into()));
        }

        if let Some(mut result) = self.cache.check_whitelist(&request.input) {
            result.latency_ms = elapsed_ms(start);
            info!(stage = "whitelist", entry = %result.text, "answered from whitelist");
            return Ok(result);
        }

        if let Some(mut result) = self.cache.get_cached_result(&request.input) {
            result.latency_ms = elapsed_ms(start);
            result.cost_usd = 0.0;
            info!(stage = "cache", cache = "hit", model = %result.model_used, "answered from cache");
            return Ok(result);
        }
        debug!(stage = "cache", cache = "miss");

        let key = serde_json::to_string(&request).unwrap_or_else(|_| request.input.clone());
        let outcome = self
            .inflight
            .try_get_with(key.clone(), self.run(request, start))
            .await;
        self.inflight.invalidate(&key).await;
        // Coalesced callers share the leader's result but not its clock.
        outcome
            .map(|mut result| {
                result.latency_ms = elapsed_ms(start);
                result
            })
            .map_err(|shared| Arc::try_unwrap(shared).unwrap_or_else(HuginnError::Shared))
    }

    /// Run many requests, returning one outcome per request in order.
    ///
    /// Requests are processed concurrently in chunks sized by the router's
    /// batch hint for the balanced model of the first request's task.
    pub async fn generate_batch(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> Vec<Result<GenerationResult>> {
        let Some(first) = requests.first() else {
            return Vec::new();
        };
        let model = self.router.select_model(first.task, Priority::Balanced);
        let chunk_size = self.router.recommended_batch_size(model).max(1);
        debug!(requests = requests.len(), chunk_size, "starting batch");

        let mut results = Vec::with_capacity(requests.len());
        let mut pending = requests.into_iter().peekable();
        while pending.peek().is_some() {
            let chunk: Vec<_> = pending.by_ref().take(chunk_size).collect();
            results.extend(join_all(chunk.into_iter().map(|r| self.generate(r))).await);
        }
        results
    }

    async fn run(&self, request: GenerationRequest, start: Instant) -> Result<GenerationResult> {
        let settings = &request.project_settings;

        let translation = match &self.translator {
            Some(translator) if settings.use_auto_translate => {
                let Ok(t) = best_effort::translate(
                    translator.as_ref(),
                    self.cache.store(),
                    &request.input,
                    &settings.target_language,
                )
                .await;
                t
            }
            _ => None,
        };
        if let Some(t) = &translation {
            debug!(stage = "translate", source = %t.source_language, "input translated");
        }

        let wants_context = settings.use_web_context
            && (!settings.use_adaptive_search || prompt::has_capitalized_token(&request.input));
        let snippets = match &self.search {
            Some(search) if wants_context => {
                let query = prompt::search_query(&request.input);
                let Ok(s) = best_effort::web_context(
                    search.as_ref(),
                    self.cache.store(),
                    &query,
                    self.context_snippets,
                )
                .await;
                s
            }
            _ => Vec::new(),
        };

        let user_prompt = prompt::build_prompt(&request.input, translation.as_ref(), &snippets);
        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompt::default_system_prompt(request.task).to_string());
        let call = GenerationCall::new("", user_prompt)
            .system_prompt(system_prompt)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .timeout(self.call_timeout);

        let primary = self.router.select_model(request.task, request.priority);
        info!(stage = "select", model = primary, "model selected");

        let (text, model) = match self.call_model(primary, &call).await {
            Ok(text) => (text, primary),
            Err(primary_err) => {
                let fallback = self.router.select_fallback_model(primary, request.task);
                warn!(
                    stage = "fallback",
                    from = primary,
                    to = fallback,
                    latency_ms = elapsed_ms(start),
                    error = %primary_err,
                    "primary call failed, falling back"
                );
                metrics::counter!(telemetry::FALLBACKS_TOTAL,
                    "from" => self.provider_label(primary),
                    "to" => self.provider_label(fallback),
                )
                .increment(1);
                match self.call_model(fallback, &call).await {
                    Ok(text) => (text, fallback),
                    Err(e) => {
                        error!(
                            stage = "fallback",
                            model = fallback,
                            latency_ms = elapsed_ms(start),
                            error = %e,
                            "fallback call failed"
                        );
                        return Err(e);
                    }
                }
            }
        };

        let provider = self.provider_label(model);
        let mut result = GenerationResult::generated(text, model, provider);
        result.context_used = !snippets.is_empty();
        result.translation = translation;

        if settings.use_evaluator && !result.is_error() {
            let Ok(evaluation) = self.evaluate(&request, &result.text).await;
            result.evaluation = evaluation;
        }

        let input_tokens = prompt::estimate_tokens(&call.prompt)
            + call.system_prompt.as_deref().map_or(0, prompt::estimate_tokens);
        let output_tokens = prompt::estimate_tokens(&result.text);
        result.cost_usd = self.router.estimate_cost(model, input_tokens, output_tokens);
        result.latency_ms = elapsed_ms(start);

        if result.is_error() {
            warn!(stage = "complete", model, "provider returned an error result, not caching");
        } else {
            self.cache.cache_result(&request.input, &result);
            metrics::histogram!(telemetry::COST_USD, "model" => model).record(result.cost_usd);
        }
        info!(
            stage = "complete",
            provider = %result.provider_used,
            model,
            latency_ms = result.latency_ms,
            cost_usd = result.cost_usd,
            context_used = result.context_used,
            "generation finished"
        );
        Ok(result)
    }

    async fn call_model(&self, model: &str, template: &GenerationCall) -> Result<String> {
        let kind = self
            .router
            .registry()
            .provider_of(model)
            .ok_or_else(|| HuginnError::ModelNotFound(model.to_string()))?;
        let call = GenerationCall {
            model: model.to_string(),
            ..template.clone()
        };
        self.providers.generate(kind, &call).await
    }

    /// Rate `output` with a cheap model. Never fails; never retried.
    async fn evaluate(
        &self,
        request: &GenerationRequest,
        output: &str,
    ) -> std::result::Result<Option<Evaluation>, Infallible> {
        let model = self.router.select_model(TaskType::Evaluation, Priority::Fast);
        let key = format!("{model}\u{1f}{}\u{1f}{}", request.input, output);
        if let Some(hit) = self.cache.store().get::<Evaluation>(&key, Namespace::Qa) {
            return Ok(Some(hit));
        }

        let call = GenerationCall::new(
            model,
            prompt::evaluation_prompt(&request.input, output, request.task),
        )
        .system_prompt(prompt::default_system_prompt(TaskType::Evaluation))
        .temperature(0.0)
        .max_tokens(EVALUATION_MAX_TOKENS)
        .timeout(self.call_timeout);

        let Some(kind) = self.router.registry().provider_of(model) else {
            return Ok(None);
        };
        let evaluation = match self.providers.generate_once(kind, &call).await {
            Ok(text) => prompt::parse_evaluation(&text),
            Err(e) => {
                warn!(stage = "evaluate", model, error = %e, "evaluation failed, omitting");
                return Ok(None);
            }
        };
        match &evaluation {
            Some(ev) => {
                debug!(stage = "evaluate", model, score = ev.score, "evaluated result");
                if let Err(e) = self
                    .cache
                    .store()
                    .set(&key, ev, SetOptions::new().namespace(Namespace::Qa))
                {
                    warn!(stage = "evaluate", error = %e, "failed to cache evaluation");
                }
            }
            None => warn!(stage = "evaluate", model, "unparseable evaluation, omitting"),
        }
        Ok(evaluation)
    }

    fn provider_label(&self, model: &str) -> &'static str {
        self.router
            .registry()
            .provider_of(model)
            .map_or("unknown", |k| k.as_str())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
