//! Huginn - generation request orchestrator for survey-answer coding
//!
//! Every request passes through the same pipeline: a brand whitelist, a
//! prompt-result cache, optional translation and web-context enrichment,
//! task-aware model routing, a provider call with one cross-provider
//! fallback, optional evaluation, and finally a cache write with cost and
//! latency recorded.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{GenerationRequest, Huginn, Priority, ProjectSettings, TaskType};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let huginn = Huginn::builder()
//!         .openai_from_env()
//!         .anthropic_from_env()
//!         .build()?;
//!
//!     let request = GenerationRequest::new("masarap ang Jollibee")
//!         .task(TaskType::Coding)
//!         .priority(Priority::Fast)
//!         .settings(ProjectSettings::plain());
//!
//!     let result = huginn.generate(request).await?;
//!     println!("{} (via {})", result.text, result.model_used);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration file
//!
//! [`HuginnConfig::load`] reads `~/.huginn/config.toml` (or
//! `/etc/huginn/config.toml`) and [`HuginnConfig::builder`] turns it into a
//! ready [`HuginnBuilder`].

pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod router;
pub mod services;
pub mod telemetry;
pub mod types;

/// Crate version, as reported by the CLI.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cache::{CacheConfig, CacheLayer};
pub use config::HuginnConfig;
pub use error::{HuginnError, Result};
pub use orchestrator::{Huginn, HuginnBuilder, Orchestrator};
pub use providers::{GenerationCall, GenerationProvider, RetryConfig};
pub use router::{ModelCriteria, ModelRouter};
pub use types::{
    ERROR_SENTINEL, Evaluation, GenerationRequest, GenerationResult, ModelInfo, Priority,
    ProjectSettings, ProviderKind, TaskType, TranslationInfo,
};
