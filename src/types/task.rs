//! Task kinds and priority tiers used for model routing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of work a generation request performs.
///
/// Deserialisation is lenient: unknown task names map to [`TaskType::General`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum TaskType {
    /// Assign a code/category to a survey answer.
    Coding,
    /// Translate an answer into the target language.
    Translation,
    /// Build background context for a brand or topic.
    ContextBuild,
    /// Score answer quality.
    QaScoring,
    /// Rate another model's output.
    Evaluation,
    /// Detect named entities (brands, products, places).
    EntityDetection,
    /// Anything else.
    #[default]
    General,
}

impl TaskType {
    /// All task kinds, in declaration order.
    pub const ALL: [TaskType; 7] = [
        Self::Coding,
        Self::Translation,
        Self::ContextBuild,
        Self::QaScoring,
        Self::Evaluation,
        Self::EntityDetection,
        Self::General,
    ];

    /// Wire name of the task.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::Translation => "translation",
            Self::ContextBuild => "context_build",
            Self::QaScoring => "qa_scoring",
            Self::Evaluation => "evaluation",
            Self::EntityDetection => "entity_detection",
            Self::General => "general",
        }
    }

    /// Parse a task name, falling back to `General` for anything unknown.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "coding" => Self::Coding,
            "translation" => Self::Translation,
            "context_build" => Self::ContextBuild,
            "qa_scoring" => Self::QaScoring,
            "evaluation" => Self::Evaluation,
            "entity_detection" => Self::EntityDetection,
            _ => Self::General,
        }
    }
}

impl From<String> for TaskType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost/latency/quality trade-off requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Priority {
    /// Cheapest and quickest model for the task.
    Fast,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Highest quality model for the task.
    Accurate,
}

impl Priority {
    /// Wire name of the priority tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Accurate => "accurate",
        }
    }

    /// Parse a priority name, falling back to `Balanced`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fast" => Self::Fast,
            "accurate" => Self::Accurate,
            _ => Self::Balanced,
        }
    }
}

impl From<String> for Priority {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_parse_known_names() {
        for task in TaskType::ALL {
            assert_eq!(TaskType::parse(task.as_str()), task);
        }
    }

    #[test]
    fn task_parse_unknown_is_general() {
        assert_eq!(TaskType::parse("sentiment"), TaskType::General);
        assert_eq!(TaskType::parse(""), TaskType::General);
    }

    #[test]
    fn task_deserialises_leniently() {
        let task: TaskType = serde_json::from_str("\"qa_scoring\"").unwrap();
        assert_eq!(task, TaskType::QaScoring);
        let task: TaskType = serde_json::from_str("\"nonsense\"").unwrap();
        assert_eq!(task, TaskType::General);
    }

    #[test]
    fn task_serialises_snake_case() {
        let json = serde_json::to_string(&TaskType::EntityDetection).unwrap();
        assert_eq!(json, "\"entity_detection\"");
    }

    #[test]
    fn priority_defaults_to_balanced() {
        assert_eq!(Priority::default(), Priority::Balanced);
        assert_eq!(Priority::parse("whatever"), Priority::Balanced);
        assert_eq!(Priority::parse("FAST"), Priority::Fast);
    }
}
