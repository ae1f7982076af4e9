//! In-memory cache for configuration lookups (field types and similar).
//!
//! Entries are keyed by `(category, name)` and may carry a TTL. Expired
//! entries are dropped lazily when read. The cache is shared as
//! `Arc<ConfigCache>`; there is no global instance.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Cache key: a category (e.g. `"field_types"`) and a name within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub category: String,
    pub name: String,
}

impl CacheKey {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, removing it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        })?;

        if hit.is_none() {
            // The read guard is gone here; `remove_if` takes the shard lock itself.
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            tracing::debug!(%key, "Cache entry expired");
        }
        hit
    }

    /// Store `value` under `key`. `None` means it never expires.
    pub fn put(&self, key: CacheKey, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Returns whether an entry was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry in `category`. Returns how many were removed.
    pub fn invalidate_category(&self, category: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.category != category);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
