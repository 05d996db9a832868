//! Generation request types.

use serde::{Deserialize, Serialize};

use super::task::{Priority, TaskType};

/// Per-project switches for the enrichment stages of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// Append web-search context to the prompt.
    pub use_web_context: bool,
    /// Only search when the input looks like it names something.
    pub use_adaptive_search: bool,
    /// Translate inputs that are not in `target_language`.
    pub use_auto_translate: bool,
    /// Run the evaluator pass after generation.
    pub use_evaluator: bool,
    /// ISO 639-1 language the prompt should be in.
    pub target_language: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            use_web_context: true,
            use_adaptive_search: true,
            use_auto_translate: true,
            use_evaluator: false,
            target_language: "en".to_string(),
        }
    }
}

impl ProjectSettings {
    /// Settings with every enrichment stage disabled.
    pub fn plain() -> Self {
        Self {
            use_web_context: false,
            use_adaptive_search: false,
            use_auto_translate: false,
            use_evaluator: false,
            ..Self::default()
        }
    }

    pub fn web_context(mut self, enabled: bool) -> Self {
        self.use_web_context = enabled;
        self
    }

    pub fn adaptive_search(mut self, enabled: bool) -> Self {
        self.use_adaptive_search = enabled;
        self
    }

    pub fn auto_translate(mut self, enabled: bool) -> Self {
        self.use_auto_translate = enabled;
        self
    }

    pub fn evaluator(mut self, enabled: bool) -> Self {
        self.use_evaluator = enabled;
        self
    }

    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.target_language = lang.into();
        self
    }
}

/// A single textual generation request.
///
/// ```rust
/// # use huginn::{GenerationRequest, Priority, TaskType};
/// let request = GenerationRequest::new("Jollibee kasi masarap")
///     .task(TaskType::Coding)
///     .priority(Priority::Fast)
///     .temperature(0.2);
/// assert_eq!(request.max_tokens, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Raw answer text. Also the cache key.
    pub input: String,
    #[serde(default)]
    pub task: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub project_settings: ProjectSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl GenerationRequest {
    /// Create a `general` request at balanced priority with default settings.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            task: TaskType::default(),
            priority: Priority::default(),
            project_settings: ProjectSettings::default(),
            system_prompt: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn task(mut self, task: TaskType) -> Self {
        self.task = task;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn settings(mut self, settings: ProjectSettings) -> Self {
        self.project_settings = settings;
        self
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
}
