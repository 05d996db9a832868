//! Static model registry.
//!
//! Records are compiled in from `models.json` and never mutated at runtime.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use tracing::warn;

use crate::types::{ModelInfo, ProviderKind};

/// Raw JSON seed compiled into the binary.
const EMBEDDED_SEED: &str = include_str!("models.json");

static EMBEDDED: LazyLock<ModelRegistry> = LazyLock::new(ModelRegistry::parse_embedded_seed);

/// Read-only table of routable models keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelInfo>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry built from an explicit record list. Later duplicates win.
    pub fn from_models(models: impl IntoIterator<Item = ModelInfo>) -> Self {
        Self {
            entries: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Shared registry populated from the embedded seed.
    pub fn embedded() -> &'static ModelRegistry {
        &EMBEDDED
    }

    fn parse_embedded_seed() -> Self {
        match serde_json::from_str::<Vec<ModelInfo>>(EMBEDDED_SEED) {
            Ok(models) => Self::from_models(models),
            Err(e) => {
                // Seed is compiled in and covered by tests; an empty registry
                // still routes to default ids.
                warn!(error = %e, "failed to parse embedded model seed");
                Self::new()
            }
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelInfo> {
        self.entries.get(model)
    }

    /// Provider serving `model`, if registered.
    pub fn provider_of(&self, model: &str) -> Option<ProviderKind> {
        self.get(model).map(|m| m.provider)
    }

    /// All records, ordered by id.
    pub fn list(&self) -> impl Iterator<Item = &ModelInfo> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
