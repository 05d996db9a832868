//! Generic namespaced key/value cache.
//!
//! Values are stored as JSON so one cache can serve unrelated subsystems
//! (translations, search snippets, QA scores). Each [`Namespace`] is an
//! isolated key space with its own TTL default and size bound:
//!
//! | namespace     | default TTL | max entries |
//! |---------------|-------------|-------------|
//! | `prompt`      | 1 h         | 500         |
//! | `translation` | 24 h        | 1,000       |
//! | `search`      | 1 h         | 200         |
//! | `qa`          | 30 min      | 500         |
//! | `general`     | 10 min      | 100         |
//!
//! Keys are normalised (trimmed, lowercased) before use. Inserting a new key
//! into a full namespace evicts the single entry with the oldest creation
//! time. Reads do not refresh an entry's position, so this is insertion-order
//! eviction rather than access-recency LRU.
//!
//! Every namespace except `general` mirrors writes to the optional
//! [`DurableStore`]; a memory miss falls through to the store and restores
//! the entry if it has not expired. Store failures are logged and otherwise
//! ignored.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::durable::{DurableStore, StoredEntry};
use super::{expiry_after, lock};
use crate::telemetry;
use crate::{HuginnError, Result};

/// Logical partition of the namespaced cache.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Prompt,
    Translation,
    Search,
    Qa,
    #[default]
    General,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Self::Prompt,
        Self::Translation,
        Self::Search,
        Self::Qa,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Translation => "translation",
            Self::Search => "search",
            Self::Qa => "qa",
            Self::General => "general",
        }
    }

    /// Whether writes to this namespace are mirrored to durable storage.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::General)
    }

    /// Flat key used for storage and export: `namespace:key`.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.as_str(), key)
    }

    fn default_config(&self) -> NamespaceConfig {
        match self {
            Self::Prompt => NamespaceConfig::new(Duration::from_secs(3600), 500),
            Self::Translation => NamespaceConfig::new(Duration::from_secs(24 * 3600), 1_000),
            Self::Search => NamespaceConfig::new(Duration::from_secs(3600), 200),
            Self::Qa => NamespaceConfig::new(Duration::from_secs(30 * 60), 500),
            Self::General => NamespaceConfig::new(Duration::from_secs(10 * 60), 100),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = HuginnError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| HuginnError::InvalidInput(format!("unknown cache namespace: {s}")))
    }
}

/// TTL and capacity of a single namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl NamespaceConfig {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries }
    }
}

/// Per-namespace configuration. Unset namespaces use the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct NamespacedCacheConfig {
    overrides: HashMap<Namespace, NamespaceConfig>,
}

impl NamespacedCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override TTL and capacity for one namespace.
    pub fn namespace(mut self, namespace: Namespace, config: NamespaceConfig) -> Self {
        self.overrides.insert(namespace, config);
        self
    }

    /// Effective configuration for `namespace`.
    pub fn get(&self, namespace: Namespace) -> NamespaceConfig {
        self.overrides
            .get(&namespace)
            .copied()
            .unwrap_or_else(|| namespace.default_config())
    }
}

/// Options for [`NamespacedCache::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Entry lifetime; `None` uses the namespace default.
    pub ttl: Option<Duration>,
    pub namespace: Namespace,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }
}

#[derive(Debug, Clone)]
struct NamespacedEntry {
    value: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    hit_count: u64,
}

impl NamespacedEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Transportable form of a namespaced entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedRecord {
    /// Flat `namespace:key` form.
    pub key: String,
    pub value: serde_json::Value,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub hits: u64,
}

/// Occupancy of one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceStats {
    pub namespace: Namespace,
    pub entries: usize,
    pub max_entries: usize,
    pub total_hits: u64,
}

type Partitions = HashMap<Namespace, HashMap<String, NamespacedEntry>>;

/// Multi-namespace TTL cache with bounded size and optional durable mirror.
pub struct NamespacedCache {
    partitions: Mutex<Partitions>,
    config: NamespacedCacheConfig,
    durable: Option<Arc<dyn DurableStore>>,
}

impl fmt::Debug for NamespacedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespacedCache")
            .field("config", &self.config)
            .field("durable", &self.durable.is_some())
            .finish()
    }
}

impl Default for NamespacedCache {
    fn default() -> Self {
        Self::new(NamespacedCacheConfig::default())
    }
}

impl NamespacedCache {
    /// Memory-only cache.
    pub fn new(config: NamespacedCacheConfig) -> Self {
        Self {
            partitions: Mutex::new(HashMap::new()),
            config,
            durable: None,
        }
    }

    /// Cache that mirrors durable namespaces into `store`.
    pub fn with_durable(config: NamespacedCacheConfig, store: Arc<dyn DurableStore>) -> Self {
        Self {
            durable: Some(store),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &NamespacedCacheConfig {
        &self.config
    }

    /// Store `value` under `key` in `opts.namespace`.
    ///
    /// Fails only if `value` cannot be serialised to JSON.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, opts: SetOptions) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let namespace = opts.namespace;
        let ns_config = self.config.get(namespace);
        let ttl = opts.ttl.unwrap_or(ns_config.ttl);
        let key = normalize_key(key);
        let now = Utc::now();
        let entry = NamespacedEntry {
            value,
            created_at: now,
            expires_at: expiry_after(now, ttl),
            hit_count: 0,
        };

        let evicted = {
            let mut partitions = lock(&self.partitions);
            let partition = partitions.entry(namespace).or_default();
            let evicted = make_room(partition, &key, ns_config.max_entries);
            partition.insert(key.clone(), entry.clone());
            evicted
        };
        if let Some(evicted) = evicted {
            debug!(namespace = %namespace, key = %evicted, "evicted oldest cache entry");
            self.durable_remove(namespace, &evicted);
        }
        if namespace.is_durable() {
            self.durable_save(namespace, &key, &entry);
        }
        Ok(())
    }

    /// Look up `key` in `namespace`.
    ///
    /// Expired entries are removed and reported as absent. A memory miss on a
    /// durable namespace consults the store. A value that no longer
    /// deserialises as `T` is reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str, namespace: Namespace) -> Option<T> {
        let value = self.get_value(key, namespace)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(namespace = %namespace, key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Raw JSON lookup backing [`get`](Self::get).
    pub fn get_value(&self, key: &str, namespace: Namespace) -> Option<serde_json::Value> {
        let key = normalize_key(key);
        let now = Utc::now();
        let lookup = {
            let mut partitions = lock(&self.partitions);
            let partition = partitions.entry(namespace).or_default();
            match partition.get(&key).map(|e| e.is_expired(now)) {
                Some(true) => {
                    partition.remove(&key);
                    Lookup::Expired
                }
                Some(false) => partition.get_mut(&key).map_or(Lookup::Miss, |entry| {
                    entry.hit_count += 1;
                    Lookup::Hit(entry.value.clone())
                }),
                None => Lookup::Miss,
            }
        };

        let found = match lookup {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired => {
                self.durable_remove(namespace, &key);
                None
            }
            Lookup::Miss => self.restore(namespace, &key, now).map(|entry| {
                let value = entry.value.clone();
                let evicted = {
                    let mut partitions = lock(&self.partitions);
                    let partition = partitions.entry(namespace).or_default();
                    let max = self.config.get(namespace).max_entries;
                    let evicted = make_room(partition, &key, max);
                    // A concurrent `set` may have written a fresher value meanwhile.
                    partition.entry(key.clone()).or_insert(NamespacedEntry {
                        hit_count: 1,
                        ..entry
                    });
                    evicted
                };
                if let Some(evicted) = evicted {
                    debug!(namespace = %namespace, key = %evicted, "evicted oldest cache entry");
                    self.durable_remove(namespace, &evicted);
                }
                value
            }),
        };

        let outcome = if found.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(outcome, "layer" => namespace.as_str()).increment(1);
        found
    }

    /// Remove one key from `namespace` (memory and durable copy).
    pub fn remove(&self, key: &str, namespace: Namespace) -> bool {
        let key = normalize_key(key);
        let removed = lock(&self.partitions)
            .get_mut(&namespace)
            .and_then(|p| p.remove(&key))
            .is_some();
        self.durable_remove(namespace, &key);
        removed
    }

    /// Clear one namespace, or all of them when `namespace` is `None`.
    pub fn clear(&self, namespace: Option<Namespace>) {
        let targets: Vec<Namespace> = match namespace {
            Some(ns) => vec![ns],
            None => Namespace::ALL.to_vec(),
        };
        {
            let mut partitions = lock(&self.partitions);
            for ns in &targets {
                partitions.remove(ns);
            }
        }
        let Some(store) = &self.durable else {
            return;
        };
        for ns in targets.into_iter().filter(Namespace::is_durable) {
            if let Err(e) = store.clear(ns) {
                warn!(namespace = %ns, error = %e, "failed to clear durable cache");
            }
        }
    }

    /// Drop expired entries in every namespace, returning the count removed
    /// from memory.
    ///
    /// The durable store is purged once per namespace, which also drops
    /// expired copies that were never loaded back into memory.
    pub fn clean_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        {
            let mut partitions = lock(&self.partitions);
            for partition in partitions.values_mut() {
                let before = partition.len();
                partition.retain(|_, e| !e.is_expired(now));
                removed += before - partition.len();
            }
        }
        if let Some(store) = &self.durable {
            for namespace in Namespace::ALL.into_iter().filter(Namespace::is_durable) {
                match store.purge_expired(namespace, now) {
                    Ok(0) => {}
                    Ok(purged) => debug!(namespace = %namespace, purged, "purged durable cache"),
                    Err(e) => {
                        warn!(namespace = %namespace, error = %e, "durable cache purge failed")
                    }
                }
            }
        }
        removed
    }

    /// Number of entries held in memory for `namespace`.
    pub fn len(&self, namespace: Namespace) -> usize {
        lock(&self.partitions)
            .get(&namespace)
            .map_or(0, HashMap::len)
    }

    /// Per-namespace occupancy, in [`Namespace::ALL`] order.
    pub fn stats(&self) -> Vec<NamespaceStats> {
        let partitions = lock(&self.partitions);
        Namespace::ALL
            .into_iter()
            .map(|namespace| {
                let partition = partitions.get(&namespace);
                NamespaceStats {
                    namespace,
                    entries: partition.map_or(0, HashMap::len),
                    max_entries: self.config.get(namespace).max_entries,
                    total_hits: partition
                        .map(|p| p.values().map(|e| e.hit_count).sum())
                        .unwrap_or(0),
                }
            })
            .collect()
    }

    /// Live entries across all namespaces in transportable form.
    pub fn export_records(&self) -> Vec<NamespacedRecord> {
        let now = Utc::now();
        let partitions = lock(&self.partitions);
        let mut records: Vec<_> = partitions
            .iter()
            .flat_map(|(namespace, partition)| {
                partition
                    .iter()
                    .filter(move |(_, e)| !e.is_expired(now))
                    .map(move |(key, e)| NamespacedRecord {
                        key: namespace.storage_key(key),
                        value: e.value.clone(),
                        timestamp: e.created_at,
                        expires_at: e.expires_at,
                        hits: e.hit_count,
                    })
            })
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
        records
    }

    /// Live entries as a JSON array.
    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export_records())?)
    }

    /// Restore entries exported by [`export`](Self::export).
    ///
    /// The whole payload is validated before anything is inserted: a
    /// malformed document or an unknown namespace prefix leaves the cache
    /// untouched. Expired records are dropped silently.
    pub fn import(&self, data: &str) -> Result<usize> {
        let records: Vec<NamespacedRecord> = serde_json::from_str(data).map_err(|e| {
            warn!(error = %e, "rejecting malformed namespaced cache import");
            HuginnError::Import(e.to_string())
        })?;
        let parsed = records
            .into_iter()
            .map(|r| split_storage_key(&r.key).map(|(ns, key)| (ns, key, r)))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| warn!(error = %e, "rejecting namespaced cache import"))?;

        let now = Utc::now();
        let mut restored = 0;
        let mut touched: Vec<(Namespace, String)> = Vec::new();
        let mut evicted: Vec<(Namespace, String)> = Vec::new();
        let mut saves = Vec::new();
        let mut removals: HashMap<Namespace, Vec<String>> = HashMap::new();
        {
            let mut partitions = lock(&self.partitions);
            for (namespace, key, record) in parsed {
                if now >= record.expires_at {
                    continue;
                }
                let max = self.config.get(namespace).max_entries;
                let partition = partitions.entry(namespace).or_default();
                if let Some(old) = make_room(partition, &key, max) {
                    evicted.push((namespace, old));
                }
                partition.insert(
                    key.clone(),
                    NamespacedEntry {
                        value: record.value,
                        created_at: record.timestamp,
                        expires_at: record.expires_at,
                        hit_count: record.hits,
                    },
                );
                touched.push((namespace, key));
                restored += 1;
            }

            // Mirror only the final state: a record may be evicted by a later
            // one in the same payload.
            for (namespace, key) in touched.into_iter().filter(|(ns, _)| ns.is_durable()) {
                if let Some(entry) = partitions.get(&namespace).and_then(|p| p.get(&key)) {
                    saves.push((namespace, key, entry.clone()));
                }
            }
            for (namespace, key) in evicted.into_iter().filter(|(ns, _)| ns.is_durable()) {
                let present = partitions
                    .get(&namespace)
                    .is_some_and(|p| p.contains_key(&key));
                if !present {
                    removals.entry(namespace).or_default().push(key);
                }
            }
        }

        for (namespace, key, entry) in &saves {
            self.durable_save(*namespace, key, entry);
        }
        if let Some(store) = &self.durable {
            for (namespace, keys) in &removals {
                if let Err(e) = store.remove_many(*namespace, keys) {
                    warn!(namespace = %namespace, error = %e, "durable cache delete failed");
                }
            }
        }
        debug!(restored, "imported namespaced cache records");
        Ok(restored)
    }

    fn restore(
        &self,
        namespace: Namespace,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<NamespacedEntry> {
        if !namespace.is_durable() {
            return None;
        }
        let store = self.durable.as_ref()?;
        let stored = match store.load(namespace, key) {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(namespace = %namespace, key, error = %e, "durable cache read failed");
                return None;
            }
        };
        if stored.is_expired(now) {
            self.durable_remove(namespace, key);
            return None;
        }
        debug!(namespace = %namespace, key, "restored cache entry from durable store");
        Some(NamespacedEntry {
            value: stored.value,
            created_at: stored.created_at,
            expires_at: stored.expires_at,
            hit_count: 0,
        })
    }

    fn durable_save(&self, namespace: Namespace, key: &str, entry: &NamespacedEntry) {
        let Some(store) = &self.durable else {
            return;
        };
        let stored = StoredEntry {
            value: entry.value.clone(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };
        if let Err(e) = store.save(namespace, key, &stored) {
            warn!(namespace = %namespace, key, error = %e, "durable cache write failed");
        }
    }

    fn durable_remove(&self, namespace: Namespace, key: &str) {
        if !namespace.is_durable() {
            return;
        }
        if let Some(store) = &self.durable
            && let Err(e) = store.remove(namespace, key)
        {
            warn!(namespace = %namespace, key, error = %e, "durable cache delete failed");
        }
    }
}

/// Trim and lowercase a cache key.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn split_storage_key(flat: &str) -> Result<(Namespace, String)> {
    let (ns, key) = flat
        .split_once(':')
        .ok_or_else(|| HuginnError::Import(format!("record key without namespace: {flat}")))?;
    let namespace = ns
        .parse::<Namespace>()
        .map_err(|_| HuginnError::Import(format!("unknown namespace in record key: {flat}")))?;
    Ok((namespace, key.to_string()))
}

/// Outcome of the in-memory half of a lookup.
enum Lookup {
    Hit(serde_json::Value),
    Expired,
    Miss,
}

/// Evict the oldest entry if inserting `key` would exceed `max_entries`.
fn make_room(
    partition: &mut HashMap<String, NamespacedEntry>,
    key: &str,
    max_entries: usize,
) -> Option<String> {
    if partition.contains_key(key) || partition.len() < max_entries.max(1) {
        return None;
    }
    evict_oldest(partition)
}

fn evict_oldest(partition: &mut HashMap<String, NamespacedEntry>) -> Option<String> {
    let oldest = partition
        .iter()
        .min_by_key(|(_, e)| e.created_at)
        .map(|(k, _)| k.clone())?;
    partition.remove(&oldest);
    Some(oldest)
}
