//! Client-side query cache keyed by tags.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tagcast_core::Tag;
use tracing::debug;

/// Cache that can mark queries stale by tag.
///
/// Implementations must be idempotent: invalidating a stale entry, or a tag
/// nothing provides, changes nothing.
#[cfg_attr(test, mockall::automock)]
pub trait QueryCache: Send + Sync {
    /// Mark every entry providing any of `tags` as stale.
    fn invalidate_tags(&self, tags: &[Tag]);
}

#[derive(Clone, Debug)]
struct CacheEntry {
    provides: Vec<Tag>,
    value: Value,
    stale: bool,
}

/// In-memory [`QueryCache`]. Entries are never removed by invalidation.
#[derive(Default)]
pub struct MemoryQueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryQueryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh result for `key`, providing `tags`.
    pub fn insert(&self, key: impl Into<String>, provides: Vec<Tag>, value: Value) {
        let _ = self.entries.write().insert(
            key.into(),
            CacheEntry {
                provides,
                value,
                stale: false,
            },
        );
    }

    /// Cached value for `key`, stale or not.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|e| e.value.clone())
    }

    /// Whether `key` is stale. `None` if absent.
    pub fn is_stale(&self, key: &str) -> Option<bool> {
        self.entries.read().get(key).map(|e| e.stale)
    }

    /// Sorted keys of stale entries.
    pub fn stale_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl QueryCache for MemoryQueryCache {
    fn invalidate_tags(&self, tags: &[Tag]) {
        if tags.is_empty() {
            return;
        }
        let mut marked = 0usize;
        for entry in self.entries.write().values_mut() {
            if !entry.stale && entry.provides.iter().any(|t| tags.contains(t)) {
                entry.stale = true;
                marked += 1;
            }
        }
        debug!(tags = tags.len(), marked, "cache invalidated");
    }
}
