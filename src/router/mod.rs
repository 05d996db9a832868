//! Model routing policy.
//!
//! [`ModelRouter`] maps a (task, priority) pair to a model id with a fixed
//! decision table, picks cross-provider fallbacks, estimates cost and
//! suggests batch sizes. Every method is a pure function of its arguments
//! and the [`ModelRegistry`]; nothing here performs I/O or holds mutable
//! state.
//!
//! | task               | fast               | balanced                  | accurate                   |
//! |--------------------|--------------------|---------------------------|----------------------------|
//! | `coding`           | `gemini-2.0-flash` | `gpt-4o-mini`             | `claude-3-5-sonnet-latest` |
//! | `translation`      | `gemini-2.0-flash` | `gemini-2.0-flash`        | `gemini-2.0-flash`         |
//! | `context_build`    | `gemini-2.0-flash` | `gemini-2.0-flash`        | `gemini-1.5-pro`           |
//! | `qa_scoring`       | `gpt-4o-mini`      | `claude-3-5-haiku-latest` | `gpt-4o`                   |
//! | `evaluation`       | `gpt-4o-mini`      | `gpt-4o-mini`             | `claude-3-5-haiku-latest`  |
//! | `entity_detection` | `gemini-2.0-flash` | `gpt-4o-mini`             | `gpt-4o`                   |
//! | `general`          | `gemini-2.0-flash` | `gpt-4o-mini`             | `claude-3-5-sonnet-latest` |

mod registry;

pub use registry::ModelRegistry;

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{ModelInfo, Priority, ProviderKind, TaskType};

/// Model used when nothing more specific applies.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Fallback for primaries that are not in the registry.
pub const DEFAULT_FALLBACK: &str = "gpt-4o-mini";

/// Batch size suggested for unregistered models.
pub const DEFAULT_BATCH_SIZE: usize = 10;

const GEMINI_FLASH: &str = "gemini-2.0-flash";
const GEMINI_PRO: &str = "gemini-1.5-pro";
const GPT_MINI: &str = "gpt-4o-mini";
const GPT_4O: &str = "gpt-4o";
const CLAUDE_HAIKU: &str = "claude-3-5-haiku-latest";
const CLAUDE_SONNET: &str = "claude-3-5-sonnet-latest";

/// Constraints for [`ModelRouter::select_custom_model`]. Unset fields do not
/// filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelCriteria {
    /// Upper bound on cost per million tokens (USD).
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u64>,
    pub min_quality: Option<f32>,
    pub preferred_provider: Option<ProviderKind>,
}

impl ModelCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_cost(mut self, usd_per_1m: f64) -> Self {
        self.max_cost = Some(usd_per_1m);
        self
    }

    pub fn max_latency_ms(mut self, ms: u64) -> Self {
        self.max_latency_ms = Some(ms);
        self
    }

    pub fn min_quality(mut self, score: f32) -> Self {
        self.min_quality = Some(score);
        self
    }

    pub fn preferred_provider(mut self, provider: ProviderKind) -> Self {
        self.preferred_provider = Some(provider);
        self
    }

    fn admits(&self, model: &ModelInfo) -> bool {
        self.max_cost.is_none_or(|c| model.cost_per_1m_tokens <= c)
            && self.max_latency_ms.is_none_or(|l| model.avg_latency_ms <= l)
            && self.min_quality.is_none_or(|q| model.quality_score >= q)
            && self.preferred_provider.is_none_or(|p| model.provider == p)
    }
}

/// Stateless routing policy over a [`ModelRegistry`].
#[derive(Debug, Clone)]
pub struct ModelRouter {
    registry: Arc<ModelRegistry>,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(ModelRegistry::embedded().clone())
    }
}

impl ModelRouter {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn model_info(&self, model: &str) -> Option<&ModelInfo> {
        self.registry.get(model)
    }

    /// Model for `task` at `priority`, from the fixed decision table.
    pub fn select_model(&self, task: TaskType, priority: Priority) -> &'static str {
        let [fast, balanced, accurate] = decision_row(task);
        match priority {
            Priority::Fast => fast,
            Priority::Balanced => balanced,
            Priority::Accurate => accurate,
        }
    }

    /// A model from a different provider than `primary`.
    ///
    /// Each provider has a fixed alternative list; the task's balanced model
    /// is preferred when it appears there. An unregistered primary yields
    /// [`DEFAULT_FALLBACK`].
    pub fn select_fallback_model(&self, primary: &str, task: TaskType) -> &'static str {
        let Some(provider) = self.registry.provider_of(primary) else {
            return DEFAULT_FALLBACK;
        };
        let alternatives = fallback_alternatives(provider);
        let preferred = self.select_model(task, Priority::Balanced);
        if alternatives.contains(&preferred) && self.registry.provider_of(preferred) != Some(provider)
        {
            return preferred;
        }
        alternatives
            .iter()
            .copied()
            .find(|m| self.registry.provider_of(m) != Some(provider))
            .unwrap_or(alternatives[0])
    }

    /// Estimated USD cost of a call: `(input + output) / 1e6 * rate`.
    /// Unregistered models cost 0.
    pub fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.registry.get(model).map_or(0.0, |m| {
            (input_tokens + output_tokens) as f64 / 1_000_000.0 * m.cost_per_1m_tokens
        })
    }

    /// Best registered model satisfying `criteria`: highest quality, then
    /// cheapest, then fastest. Falls back to [`DEFAULT_MODEL`].
    pub fn select_custom_model(&self, criteria: &ModelCriteria) -> String {
        self.registry
            .list()
            .filter(|m| criteria.admits(m))
            .min_by(|a, b| rank(a, b))
            .map_or_else(|| DEFAULT_MODEL.to_string(), |m| m.id.clone())
    }

    /// Suggested batch size: faster models take larger batches.
    pub fn recommended_batch_size(&self, model: &str) -> usize {
        match self.registry.get(model).map(|m| m.avg_latency_ms) {
            Some(ms) if ms < 500 => 20,
            Some(ms) if ms < 1000 => 10,
            Some(_) => 5,
            None => DEFAULT_BATCH_SIZE,
        }
    }
}

fn decision_row(task: TaskType) -> [&'static str; 3] {
    match task {
        TaskType::Coding => [GEMINI_FLASH, GPT_MINI, CLAUDE_SONNET],
        TaskType::Translation => [GEMINI_FLASH, GEMINI_FLASH, GEMINI_FLASH],
        TaskType::ContextBuild => [GEMINI_FLASH, GEMINI_FLASH, GEMINI_PRO],
        TaskType::QaScoring => [GPT_MINI, CLAUDE_HAIKU, GPT_4O],
        TaskType::Evaluation => [GPT_MINI, GPT_MINI, CLAUDE_HAIKU],
        TaskType::EntityDetection => [GEMINI_FLASH, GPT_MINI, GPT_4O],
        TaskType::General => [GEMINI_FLASH, GPT_MINI, CLAUDE_SONNET],
    }
}

fn fallback_alternatives(provider: ProviderKind) -> &'static [&'static str] {
    match provider {
        ProviderKind::OpenAi => &[CLAUDE_HAIKU, GEMINI_FLASH],
        ProviderKind::Anthropic => &[GPT_MINI, GEMINI_FLASH],
        ProviderKind::Google => &[GPT_MINI, CLAUDE_HAIKU],
    }
}

fn rank(a: &ModelInfo, b: &ModelInfo) -> Ordering {
    b.quality_score
        .total_cmp(&a.quality_score)
        .then(a.cost_per_1m_tokens.total_cmp(&b.cost_per_1m_tokens))
        .then(a.avg_latency_ms.cmp(&b.avg_latency_ms))
}
