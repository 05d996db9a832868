//! Degrading wrappers around the enrichment services.
//!
//! These never fail: the error type is [`Infallible`]. Service errors are
//! logged and replaced by a no-op value (no translation, no context).
//! Successful lookups are memoised in the namespaced cache.

use std::convert::Infallible;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::search::{ContextSearch, SearchSnippet};
use super::translation::{Translator, same_language};
use crate::cache::{Namespace, NamespacedCache, SetOptions};
use crate::types::TranslationInfo;

/// Language verdict and optional translation, as memoised.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedTranslation {
    source_language: String,
    /// `None` when the input was already in the target language.
    translated: Option<String>,
}

/// Translate `input` into `target` unless it is already in `target`.
///
/// `Ok(None)` covers both "no translation needed" and "translation failed".
pub(crate) async fn translate(
    translator: &dyn Translator,
    store: &NamespacedCache,
    input: &str,
    target: &str,
) -> Result<Option<TranslationInfo>, Infallible> {
    let key = format!("{target}:{input}");
    let cached = store.get::<CachedTranslation>(&key, Namespace::Translation);
    let verdict = match cached {
        Some(hit) => {
            debug!(stage = "translate", cache = "hit", "translation cache hit");
            hit
        }
        None => {
            let start = Instant::now();
            match detect_and_translate(translator, input, target).await {
                Ok(fresh) => {
                    if let Err(e) =
                        store.set(&key, &fresh, SetOptions::new().namespace(Namespace::Translation))
                    {
                        warn!(stage = "translate", error = %e, "failed to cache translation");
                    }
                    fresh
                }
                Err(e) => {
                    warn!(
                        stage = "translate",
                        latency_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "translation failed, using original input"
                    );
                    return Ok(None);
                }
            }
        }
    };

    Ok(verdict.translated.map(|translated| TranslationInfo {
        original: input.to_string(),
        translated,
        source_language: verdict.source_language,
        target_language: target.to_string(),
    }))
}

async fn detect_and_translate(
    translator: &dyn Translator,
    input: &str,
    target: &str,
) -> crate::Result<CachedTranslation> {
    let detected = translator.detect_language(input).await?;
    if same_language(&detected, target) {
        return Ok(CachedTranslation {
            source_language: detected,
            translated: None,
        });
    }
    let translation = translator.translate(input, target).await?;
    let source_language = if translation.source_language.is_empty() {
        detected
    } else {
        translation.source_language
    };
    // An echo of the input is no translation at all.
    let translated = Some(translation.text).filter(|t| t.trim() != input.trim());
    Ok(CachedTranslation {
        source_language,
        translated,
    })
}

/// Up to `limit` ranked snippets for `query`; empty on any failure.
pub(crate) async fn web_context(
    search: &dyn ContextSearch,
    store: &NamespacedCache,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchSnippet>, Infallible> {
    if let Some(hit) = store.get::<Vec<SearchSnippet>>(query, Namespace::Search) {
        debug!(stage = "context", cache = "hit", snippets = hit.len(), "search cache hit");
        return Ok(hit.into_iter().take(limit).collect());
    }
    let start = Instant::now();
    match search.search(query, limit).await {
        Ok(snippets) => {
            if let Err(e) = store.set(query, &snippets, SetOptions::new().namespace(Namespace::Search))
            {
                warn!(stage = "context", error = %e, "failed to cache search results");
            }
            debug!(
                stage = "context",
                snippets = snippets.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "fetched web context"
            );
            Ok(snippets)
        }
        Err(e) => {
            warn!(
                stage = "context",
                latency_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "web context failed, continuing without it"
            );
            Ok(Vec::new())
        }
    }
}
