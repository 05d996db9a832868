//! Caching subsystem.
//!
//! Three independent stores sit behind the [`CacheLayer`] facade:
//!
//! - [`Whitelist`]: known answer literals that short-circuit generation
//!   entirely.
//! - [`PromptCache`]: generation results keyed by raw input, 1 hour TTL.
//!   Whitelist and error results are never written.
//! - [`NamespacedCache`]: generic JSON key/value store partitioned into
//!   namespaces (`prompt`, `translation`, `search`, `qa`, `general`), each
//!   with its own TTL and size bound. Durable namespaces mirror to a
//!   [`DurableStore`].
//!
//! All state is owned by the [`CacheLayer`] instance; there are no
//! process-wide singletons. Map operations hold a short std lock and never
//! await.

pub mod durable;
mod layer;
pub mod namespaced;
pub mod prompt;
pub mod whitelist;

pub use durable::{DurableStore, FileStore, MemoryStore, StoredEntry};
pub use layer::{CacheConfig, CacheLayer, CacheStats, MIN_SWEEP_INTERVAL};
pub use namespaced::{
    Namespace, NamespaceConfig, NamespaceStats, NamespacedCache, NamespacedCacheConfig,
    NamespacedRecord, SetOptions,
};
pub use prompt::{PromptCache, PromptCacheRecord, PromptCacheStats};
pub use whitelist::Whitelist;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

// A panic while holding a cache lock leaves the map structurally valid, so
// poisoned locks are recovered rather than propagated.

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

/// Whether an entry created at `created_at` has outlived `ttl` at `now`.
pub(crate) fn expired(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(created_at) >= ttl
}

/// Expiry instant for an entry written at `now` with lifetime `ttl`.
///
/// Saturates at the latest representable time instead of overflowing.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
