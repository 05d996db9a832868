//! Durable mirror for namespaced cache entries.
//!
//! Entries written to any namespace other than `general` are mirrored to a
//! [`DurableStore`] so they survive process restarts. Stored copies carry the
//! same expiry as the in-memory entry; [`NamespacedCache`](super::NamespacedCache)
//! validates it on restore and discards stale copies.
//!
//! Two implementations ship with the crate:
//! - [`FileStore`]: one JSON document per namespace under a directory
//!   (default: `<user cache dir>/huginn`);
//! - [`MemoryStore`]: process-local map, for tests and embedding.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lock;
use super::namespaced::Namespace;
use crate::{HuginnError, Result};

/// Persisted copy of a namespaced entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: serde_json::Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Backing store for durable namespaced entries.
///
/// Calls are synchronous. [`NamespacedCache`](super::NamespacedCache) makes
/// them after releasing its own map lock, but still on the calling task, so
/// implementations should be quick (local disk or memory).
pub trait DurableStore: Send + Sync {
    /// Fetch the stored copy of `key` in `namespace`.
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<StoredEntry>>;

    /// Write (or overwrite) the stored copy of `key`.
    fn save(&self, namespace: Namespace, key: &str, entry: &StoredEntry) -> Result<()>;

    /// Delete the stored copy of `key`, if any.
    fn remove(&self, namespace: Namespace, key: &str) -> Result<()>;

    /// Delete several keys from `namespace` in one pass.
    fn remove_many(&self, namespace: Namespace, keys: &[String]) -> Result<()> {
        keys.iter().try_for_each(|key| self.remove(namespace, key))
    }

    /// Delete every stored entry in `namespace` that has expired at `now`,
    /// returning how many were dropped.
    fn purge_expired(&self, namespace: Namespace, now: DateTime<Utc>) -> Result<usize>;

    /// Delete every stored entry in `namespace`.
    fn clear(&self, namespace: Namespace) -> Result<()>;
}

// ============================================================================
// FileStore
// ============================================================================

type NamespaceFile = BTreeMap<String, StoredEntry>;

/// Directory-backed store: `<dir>/<namespace>.json` per namespace.
///
/// Each namespace file is parsed once, on first use, and then served from
/// memory. Mutations rewrite the file only when something changed.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    // Parsed namespace files; also serialises writes to them.
    loaded: Mutex<HashMap<Namespace, NamespaceFile>>,
}

impl FileStore {
    /// Store rooted at `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Store rooted at the platform cache directory (`~/.cache/huginn` on Linux).
    pub fn in_user_cache_dir() -> Result<Self> {
        let base = dirs::cache_dir().ok_or_else(|| {
            HuginnError::Configuration("no user cache directory on this platform".into())
        })?;
        Ok(Self::new(base.join("huginn")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: Namespace) -> PathBuf {
        self.dir.join(format!("{}.json", namespace.as_str()))
    }

    fn read_namespace(&self, namespace: Namespace) -> Result<NamespaceFile> {
        let path = self.path_for(namespace);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Storage(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            HuginnError::Storage(format!("failed to parse {}: {e}", path.display()))
        })
    }

    fn write_namespace(&self, namespace: Namespace, entries: &NamespaceFile) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            HuginnError::Storage(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        let path = self.path_for(namespace);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string(entries)?;
        fs::write(&tmp, content).map_err(|e| {
            HuginnError::Storage(format!("failed to write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            HuginnError::Storage(format!("failed to replace {}: {e}", path.display()))
        })
    }

    fn entries<'a>(
        &self,
        loaded: &'a mut HashMap<Namespace, NamespaceFile>,
        namespace: Namespace,
    ) -> Result<&'a mut NamespaceFile> {
        match loaded.entry(namespace) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(self.read_namespace(namespace)?)),
        }
    }

    /// Apply `f` to the namespace's entries and persist them if `f` reports
    /// any change.
    fn update<F>(&self, namespace: Namespace, f: F) -> Result<usize>
    where
        F: FnOnce(&mut NamespaceFile) -> usize,
    {
        let mut loaded = lock(&self.loaded);
        let entries = self.entries(&mut loaded, namespace)?;
        let changed = f(entries);
        if changed > 0 {
            self.write_namespace(namespace, entries)?;
        }
        Ok(changed)
    }
}

impl DurableStore for FileStore {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<StoredEntry>> {
        let mut loaded = lock(&self.loaded);
        Ok(self.entries(&mut loaded, namespace)?.get(key).cloned())
    }

    fn save(&self, namespace: Namespace, key: &str, entry: &StoredEntry) -> Result<()> {
        self.update(namespace, |entries| {
            entries.insert(key.to_string(), entry.clone());
            1
        })
        .map(drop)
    }

    fn remove(&self, namespace: Namespace, key: &str) -> Result<()> {
        self.update(namespace, |entries| usize::from(entries.remove(key).is_some()))
            .map(drop)
    }

    fn remove_many(&self, namespace: Namespace, keys: &[String]) -> Result<()> {
        self.update(namespace, |entries| {
            keys.iter()
                .filter(|key| entries.remove(key.as_str()).is_some())
                .count()
        })
        .map(drop)
    }

    fn purge_expired(&self, namespace: Namespace, now: DateTime<Utc>) -> Result<usize> {
        self.update(namespace, |entries| {
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(now));
            before - entries.len()
        })
    }

    fn clear(&self, namespace: Namespace) -> Result<()> {
        let mut loaded = lock(&self.loaded);
        let path = self.path_for(namespace);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                HuginnError::Storage(format!("failed to remove {}: {e}", path.display()))
            })?;
        }
        loaded.insert(namespace, BTreeMap::new());
        Ok(())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store keyed by `namespace:key`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<StoredEntry>> {
        Ok(lock(&self.entries)
            .get(&namespace.storage_key(key))
            .cloned())
    }

    fn save(&self, namespace: Namespace, key: &str, entry: &StoredEntry) -> Result<()> {
        lock(&self.entries).insert(namespace.storage_key(key), entry.clone());
        Ok(())
    }

    fn remove(&self, namespace: Namespace, key: &str) -> Result<()> {
        lock(&self.entries).remove(&namespace.storage_key(key));
        Ok(())
    }

    fn purge_expired(&self, namespace: Namespace, now: DateTime<Utc>) -> Result<usize> {
        let prefix = namespace.storage_key("");
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|k, e| !(k.starts_with(&prefix) && e.is_expired(now)));
        Ok(before - entries.len())
    }

    fn clear(&self, namespace: Namespace) -> Result<()> {
        let prefix = namespace.storage_key("");
        lock(&self.entries).retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}
