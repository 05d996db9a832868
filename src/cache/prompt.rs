//! Prompt-result cache.
//!
//! Keyed by the raw input string (no normalisation: "GCash" and "gcash " are
//! different keys). Entries expire after a fixed TTL and are purged lazily on
//! access or by [`PromptCache::clean_expired`].
//!
//! Only successful generations are stored: whitelist results and texts
//! carrying [`ERROR_SENTINEL`](crate::types::ERROR_SENTINEL) are skipped.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{expired, lock};
use crate::telemetry;
use crate::types::GenerationResult;
use crate::{HuginnError, Result};

/// Default prompt-cache TTL (1 hour).
pub const DEFAULT_PROMPT_TTL: Duration = Duration::from_secs(3600);

/// Default prompt-cache capacity.
pub const DEFAULT_PROMPT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct PromptCacheEntry {
    result: GenerationResult,
    created_at: DateTime<Utc>,
    hit_count: u64,
}

/// Transportable form of a prompt-cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptCacheRecord {
    pub input: String,
    pub result: GenerationResult,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub hits: u64,
}

/// Snapshot of prompt-cache occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptCacheStats {
    pub entries: usize,
    pub total_hits: u64,
}

/// TTL cache of generation results keyed by raw input.
#[derive(Debug)]
pub struct PromptCache {
    entries: Mutex<HashMap<String, PromptCacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for PromptCache {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TTL, DEFAULT_PROMPT_MAX_ENTRIES)
    }
}

impl PromptCache {
    /// Create a cache with the given TTL and capacity.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live result for `input`, bumping its hit counter.
    pub fn get(&self, input: &str) -> Option<GenerationResult> {
        let now = Utc::now();
        let mut entries = lock(&self.entries);
        let hit = match entries
            .get(input)
            .map(|e| expired(e.created_at, self.ttl, now))
        {
            Some(true) => {
                entries.remove(input);
                None
            }
            Some(false) => entries.get_mut(input).map(|entry| {
                entry.hit_count += 1;
                entry.result.clone()
            }),
            None => None,
        };
        let outcome = if hit.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(outcome, "layer" => "prompt").increment(1);
        hit
    }

    /// Store `result` under `input`.
    ///
    /// Returns `false` without touching the cache when the result came from
    /// the whitelist or carries the error sentinel.
    pub fn insert(&self, input: &str, result: &GenerationResult) -> bool {
        if result.from_whitelist || result.is_error() {
            debug!(input, "skipping prompt cache write");
            return false;
        }
        let mut stored = result.clone();
        stored.from_cache = false;
        let mut entries = lock(&self.entries);
        if !entries.contains_key(input) && entries.len() >= self.max_entries {
            evict_oldest(&mut entries);
        }
        entries.insert(
            input.to_string(),
            PromptCacheEntry {
                result: stored,
                created_at: Utc::now(),
                hit_count: 0,
            },
        );
        true
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn clean_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, e| !expired(e.created_at, self.ttl, now));
        before - entries.len()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Number of stored entries (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit counter of a live entry.
    pub fn hit_count(&self, input: &str) -> Option<u64> {
        let now = Utc::now();
        lock(&self.entries)
            .get(input)
            .filter(|e| !expired(e.created_at, self.ttl, now))
            .map(|e| e.hit_count)
    }

    pub fn stats(&self) -> PromptCacheStats {
        let entries = lock(&self.entries);
        PromptCacheStats {
            entries: entries.len(),
            total_hits: entries.values().map(|e| e.hit_count).sum(),
        }
    }

    /// Live entries in transportable form.
    pub fn export_records(&self) -> Vec<PromptCacheRecord> {
        let now = Utc::now();
        let mut records: Vec<_> = lock(&self.entries)
            .iter()
            .filter(|(_, e)| !expired(e.created_at, self.ttl, now))
            .map(|(input, e)| PromptCacheRecord {
                input: input.clone(),
                result: e.result.clone(),
                timestamp: e.created_at,
                hits: e.hit_count,
            })
            .collect();
        records.sort_by_key(|r| r.timestamp);
        records
    }

    /// Live entries as a JSON array.
    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export_records())?)
    }

    /// Restore entries exported by [`export`](Self::export).
    ///
    /// Records whose age already exceeds the TTL are dropped silently.
    /// A payload that fails to parse leaves the cache untouched.
    pub fn import(&self, data: &str) -> Result<usize> {
        let records: Vec<PromptCacheRecord> = serde_json::from_str(data).map_err(|e| {
            warn!(error = %e, "rejecting malformed prompt cache import");
            HuginnError::Import(e.to_string())
        })?;
        Ok(self.import_records(records))
    }

    /// Restore already-parsed records, returning how many were kept.
    pub fn import_records(&self, records: Vec<PromptCacheRecord>) -> usize {
        let now = Utc::now();
        let mut entries = lock(&self.entries);
        let mut restored = 0;
        for record in records {
            if expired(record.timestamp, self.ttl, now)
                || record.result.from_whitelist
                || record.result.is_error()
            {
                continue;
            }
            if !entries.contains_key(&record.input) && entries.len() >= self.max_entries {
                evict_oldest(&mut entries);
            }
            entries.insert(
                record.input,
                PromptCacheEntry {
                    result: record.result,
                    created_at: record.timestamp,
                    hit_count: record.hits,
                },
            );
            restored += 1;
        }
        debug!(restored, "imported prompt cache records");
        restored
    }
}

fn evict_oldest(entries: &mut HashMap<String, PromptCacheEntry>) {
    if let Some(oldest) = entries
        .iter()
        .min_by_key(|(_, e)| e.created_at)
        .map(|(k, _)| k.clone())
    {
        entries.remove(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ERROR_SENTINEL;

    fn result(text: &str) -> GenerationResult {
        GenerationResult::generated(text, "gpt-4o-mini", "openai")
    }

    #[test]
    fn miss_then_hit_counts() {
        let cache = PromptCache::default();
        assert!(cache.get("Jollibee kasi masarap").is_none());
        assert!(cache.insert("Jollibee kasi masarap", &result("Fast food")));
        assert_eq!(cache.get("Jollibee kasi masarap").unwrap().text, "Fast food");
        cache.get("Jollibee kasi masarap");
        assert_eq!(cache.hit_count("Jollibee kasi masarap"), Some(2));
    }

    #[test]
    fn key_is_raw_input() {
        let cache = PromptCache::default();
        cache.insert("Answer", &result("x"));
        assert!(cache.get("answer").is_none());
        assert!(cache.get("Answer ").is_none());
    }

    #[test]
    fn whitelist_results_are_not_stored() {
        let cache = PromptCache::default();
        assert!(!cache.insert("GCash", &GenerationResult::whitelisted("GCash")));
        assert!(cache.get("GCash").is_none());
    }

    #[test]
    fn error_sentinel_results_are_not_stored() {
        let cache = PromptCache::default();
        let failed = result(&format!("{ERROR_SENTINEL} upstream refused"));
        assert!(!cache.insert("bad", &failed));
        assert!(cache.get("bad").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_insert() {
        let cache = PromptCache::new(DEFAULT_PROMPT_TTL, 2);
        cache.insert("a", &result("1"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", &result("2"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c", &result("3"));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn expired_entries_are_invisible_and_purged() {
        let cache = PromptCache::new(Duration::from_millis(10), 100);
        cache.insert("old", &result("x"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("old").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clean_expired_counts_removed() {
        let cache = PromptCache::new(Duration::from_millis(10), 100);
        cache.insert("a", &result("x"));
        cache.insert("b", &result("y"));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.clean_expired(), 2);
        assert_eq!(cache.clean_expired(), 0);
    }

    #[test]
    fn export_import_preserves_hits() {
        let source = PromptCache::default();
        source.insert("q", &result("answer"));
        source.get("q");
        let payload = source.export().unwrap();

        let target = PromptCache::default();
        assert_eq!(target.import(&payload).unwrap(), 1);
        assert_eq!(target.hit_count("q"), Some(1));
        assert_eq!(target.get("q").unwrap().text, "answer");
    }

    #[test]
    fn import_drops_stale_records() {
        let cache = PromptCache::default();
        let stale = PromptCacheRecord {
            input: "stale".into(),
            result: result("x"),
            timestamp: Utc::now() - chrono::TimeDelta::hours(2),
            hits: 4,
        };
        let fresh = PromptCacheRecord {
            input: "fresh".into(),
            result: result("y"),
            timestamp: Utc::now(),
            hits: 0,
        };
        let payload = serde_json::to_string(&vec![stale, fresh]).unwrap();
        assert_eq!(cache.import(&payload).unwrap(), 1);
        assert!(cache.get("stale").is_none());
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn malformed_import_leaves_cache_unchanged() {
        let cache = PromptCache::default();
        cache.insert("keep", &result("x"));
        let err = cache.import("{not json").unwrap_err();
        assert!(matches!(err, HuginnError::Import(_)));
        assert_eq!(cache.len(), 1);
    }
}
