//! Enrichment collaborators used by the orchestrator.
//!
//! Both are optional. Their failures never abort a request; see the
//! best-effort wrappers used by the pipeline.

pub(crate) mod best_effort;
pub mod search;
pub mod translation;

pub use search::{ContextSearch, HttpContextSearch, SearchSnippet};
pub use translation::{HttpTranslator, Translation, Translator, same_language};
