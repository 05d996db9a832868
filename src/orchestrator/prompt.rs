//! Prompt assembly and evaluation parsing.

use std::fmt::Write as _;

use crate::services::SearchSnippet;
use crate::types::{Evaluation, TaskType, TranslationInfo};

/// Longest query sent to web search.
const MAX_QUERY_CHARS: usize = 128;

/// Whether `input` has a token starting with an uppercase letter.
///
/// Adaptive search only fetches web context for such inputs, on the theory
/// that capitalised words are usually names.
pub fn has_capitalized_token(input: &str) -> bool {
    input.split_whitespace().any(|token| {
        token
            .trim_start_matches(|c: char| !c.is_alphanumeric())
            .chars()
            .next()
            .is_some_and(char::is_uppercase)
    })
}

/// Web search query for `input`.
pub(crate) fn search_query(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_QUERY_CHARS)
        .collect()
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// System prompt used when the request does not supply one.
pub(crate) fn default_system_prompt(task: TaskType) -> &'static str {
    match task {
        TaskType::Coding => {
            "You code open-ended survey answers. Reply with the single most \
             fitting short category label for the answer, nothing else."
        }
        TaskType::Translation => {
            "Translate the answer into clear English. Reply with the translation only."
        }
        TaskType::ContextBuild => {
            "Summarise what the answer refers to in one or two sentences, using \
             the web context when it helps."
        }
        TaskType::QaScoring => {
            "Rate how well the assigned code fits the answer. Reply with a number \
             between 0 and 1."
        }
        TaskType::Evaluation => {
            "You review automated survey coding. Reply only with JSON of the form \
             {\"score\": <0..1>, \"comments\": \"...\"}."
        }
        TaskType::EntityDetection => {
            "List the brands, companies or products named in the answer, one per \
             line. Reply with \"none\" if there are none."
        }
        TaskType::General => "You are a concise assistant for survey analysis.",
    }
}

/// User prompt: the answer, its translation and any ranked web context.
pub(crate) fn build_prompt(
    input: &str,
    translation: Option<&TranslationInfo>,
    snippets: &[SearchSnippet],
) -> String {
    let mut prompt = format!("Answer: {input}");
    if let Some(t) = translation {
        let _ = write!(
            prompt,
            "\nTranslation ({} -> {}): {}",
            t.source_language, t.target_language, t.translated
        );
    }
    if !snippets.is_empty() {
        prompt.push_str("\n\nWeb context:");
        for s in snippets {
            let _ = write!(prompt, "\n{}. {}: {}", s.rank, s.title, s.snippet);
        }
    }
    prompt
}

/// Prompt asking the evaluator to rate `output` as a response to `input`.
pub(crate) fn evaluation_prompt(input: &str, output: &str, task: TaskType) -> String {
    format!(
        "Task: {task}\nAnswer: {input}\nProposed output: {output}\n\n\
         Rate the proposed output from 0.0 (wrong) to 1.0 (perfect). Respond \
         with JSON only: {{\"score\": <number>, \"comments\": \"<short reason>\"}}"
    )
}

/// Pull an [`Evaluation`] out of free-form evaluator output.
///
/// Takes the first balanced `{...}` object in `text`. The score is clamped
/// to `[0, 1]`; a missing or non-numeric score yields `None`.
pub fn parse_evaluation(text: &str) -> Option<Evaluation> {
    let object = first_json_object(text)?;
    let value: serde_json::Value = serde_json::from_str(object).ok()?;
    let score = match value.get("score")? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    let comments = value
        .get("comments")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();
    Some(Evaluation {
        score: score.clamp(0.0, 1.0) as f32,
        comments,
    })
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalized_token_detection() {
        assert!(has_capitalized_token("I like Jollibee"));
        assert!(has_capitalized_token("\"Maya\" app"));
        assert!(!has_capitalized_token("masarap kasi mura"));
        assert!(!has_capitalized_token("123 456"));
        assert!(!has_capitalized_token(""));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn prompt_includes_translation_and_ranked_context() {
        let translation = TranslationInfo {
            original: "masarap".into(),
            translated: "delicious".into(),
            source_language: "tl".into(),
            target_language: "en".into(),
        };
        let snippets = vec![SearchSnippet {
            rank: 1,
            title: "Jollibee".into(),
            snippet: "Fast food chain".into(),
            link: String::new(),
        }];
        let prompt = build_prompt("masarap", Some(&translation), &snippets);
        assert!(prompt.starts_with("Answer: masarap"));
        assert!(prompt.contains("Translation (tl -> en): delicious"));
        assert!(prompt.contains("1. Jollibee: Fast food chain"));
    }

    #[test]
    fn plain_prompt_has_no_sections() {
        assert_eq!(build_prompt("ok", None, &[]), "Answer: ok");
    }

    #[test]
    fn evaluation_parses_embedded_json() {
        let eval =
            parse_evaluation("Sure! {\"score\": 0.85, \"comments\": \"fits {well}\"} done").unwrap();
        assert!((eval.score - 0.85).abs() < 1e-6);
        assert_eq!(eval.comments, "fits {well}");
    }

    #[test]
    fn evaluation_score_is_clamped() {
        assert_eq!(parse_evaluation(r#"{"score": 7}"#).unwrap().score, 1.0);
        assert_eq!(parse_evaluation(r#"{"score": -2}"#).unwrap().score, 0.0);
        assert_eq!(parse_evaluation(r#"{"score": "0.5"}"#).unwrap().score, 0.5);
    }

    #[test]
    fn evaluation_without_score_is_none() {
        assert!(parse_evaluation("no json here").is_none());
        assert!(parse_evaluation(r#"{"comments": "x"}"#).is_none());
        assert!(parse_evaluation(r#"{"score": true}"#).is_none());
    }

    #[test]
    fn search_query_collapses_whitespace() {
        assert_eq!(search_query("  Mang   Inasal\n"), "Mang Inasal");
        assert_eq!(search_query(&"x".repeat(500)).len(), MAX_QUERY_CHARS);
    }
}
