use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::debug;

use crate::error::{Result, SeriesError};

/// Bump whenever a cached payload's shape changes; older entries read as misses.
pub const CACHE_VERSION: u32 = 1;

pub const RESULTS_TTL: Duration = Duration::from_secs(15 * 60);
pub const SERIES_CONTEXT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Raw string key/value storage behind [`SeriesCache`].
///
/// Implementations may fail freely; callers treat every error as a miss.
pub trait CacheStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Session-scoped in-memory store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once the summed value sizes would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > limit {
                return Err(SeriesError::Quota { needed, limit });
            }
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// The semantic keys a series caches under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum CacheKey {
    Results,
    SeriesContext,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    timestamp: i64,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    timestamp: i64,
    payload: T,
}

/// Versioned, TTL-checked cache namespaced to one series.
///
/// Best effort throughout: storage and (de)serialization errors are logged and
/// read as misses or ignored writes.
#[derive(Debug)]
pub struct SeriesCache<S> {
    store: S,
    namespace: String,
    enabled: bool,
}

impl<S: CacheStore> SeriesCache<S> {
    pub fn new(store: S, series_id: &str) -> Self {
        Self {
            store,
            namespace: series_id.to_string(),
            enabled: true,
        }
    }

    /// Cache that never reads or writes.
    pub fn disabled(store: S, series_id: &str) -> Self {
        Self {
            enabled: false,
            ..Self::new(store, series_id)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn storage_key(&self, key: CacheKey) -> String {
        format!("dgseries:{}:cache:{key}", self.namespace)
    }

    /// Payload stored under `key`, if present, version-matched and younger than `ttl`.
    pub fn get<T: DeserializeOwned>(&self, key: CacheKey, ttl: Duration) -> Option<T> {
        let envelope = self.read::<T>(key)?;
        let age_ms = Utc::now().timestamp_millis() - envelope.timestamp;
        if age_ms > i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX) {
            debug!(%key, age_ms, "cache entry expired");
            return None;
        }
        debug!(%key, age_ms, "cache hit");
        Some(envelope.payload)
    }

    /// Payload stored under `key` regardless of age. Version is still checked.
    pub fn get_stale<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        self.read::<T>(key).map(|e| e.payload)
    }

    pub fn set<T: Serialize>(&self, key: CacheKey, payload: &T) {
        if !self.enabled {
            return;
        }
        let envelope = EnvelopeRef {
            version: CACHE_VERSION,
            timestamp: Utc::now().timestamp_millis(),
            payload,
        };
        let result = serde_json::to_string(&envelope)
            .map_err(SeriesError::from)
            .and_then(|raw| self.store.set(&self.storage_key(key), raw));
        if let Err(e) = result {
            debug!(%key, error = %e, "cache write skipped");
        }
    }

    pub fn clear(&self, key: CacheKey) {
        if let Err(e) = self.store.remove(&self.storage_key(key)) {
            debug!(%key, error = %e, "cache clear failed");
        }
    }

    /// Drop every key this series owns.
    pub fn evict_all(&self) {
        for key in CacheKey::iter() {
            self.clear(key);
        }
    }

    fn read<T: DeserializeOwned>(&self, key: CacheKey) -> Option<Envelope<T>> {
        if !self.enabled {
            return None;
        }
        let raw = match self.store.get(&self.storage_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "cache miss");
                return None;
            }
            Err(e) => {
                debug!(%key, error = %e, "cache read failed");
                return None;
            }
        };
        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(%key, error = %e, "cache entry unreadable");
                return None;
            }
        };
        if envelope.version != CACHE_VERSION {
            debug!(%key, version = envelope.version, "cache entry from older schema");
            return None;
        }
        Some(envelope)
    }
}
