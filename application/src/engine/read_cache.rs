//! In-process read cache
//!
//! Three independent path-keyed maps, each behind its own mutex. There is
//! no cross-map atomicity: a reader racing a write may see a half-updated
//! cache until the next invalidation.

use crate::ports::read_cache::{CacheStats, ReadCache};
use regpilot_domain::{ConfigPath, ConfigValue, KeyPath};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memoizing [`ReadCache`] populated lazily by the value store
#[derive(Default)]
pub struct MemoryReadCache {
    key_exists: Mutex<HashMap<String, bool>>,
    value_exists: Mutex<HashMap<String, bool>>,
    values: Mutex<HashMap<String, Option<ConfigValue>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryReadCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn record<T>(&self, found: Option<T>) -> Option<T> {
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }
}

impl ReadCache for MemoryReadCache {
    fn key_exists(&self, key: &KeyPath) -> Option<bool> {
        let found = lock(&self.key_exists).get(&key.cache_key()).copied();
        self.record(found)
    }

    fn put_key_exists(&self, key: &KeyPath, exists: bool) {
        lock(&self.key_exists).insert(key.cache_key(), exists);
    }

    fn value_exists(&self, path: &ConfigPath) -> Option<bool> {
        let found = lock(&self.value_exists).get(&path.cache_key()).copied();
        self.record(found)
    }

    fn put_value_exists(&self, path: &ConfigPath, exists: bool) {
        lock(&self.value_exists).insert(path.cache_key(), exists);
    }

    fn value(&self, path: &ConfigPath) -> Option<Option<ConfigValue>> {
        let found = lock(&self.values).get(&path.cache_key()).cloned();
        self.record(found)
    }

    fn put_value(&self, path: &ConfigPath, value: Option<ConfigValue>) {
        lock(&self.values).insert(path.cache_key(), value);
    }

    fn invalidate_key(&self, key: &KeyPath) {
        let base = key.cache_key();
        let below = format!("{}\\", base);
        let own_values = format!("{}::", base);
        let ancestors: Vec<String> = {
            let mut out = Vec::new();
            let mut current = key.parent();
            while let Some(parent) = current {
                out.push(parent.cache_key());
                current = parent.parent();
            }
            out
        };

        lock(&self.key_exists)
            .retain(|k, _| !(k == &base || k.starts_with(&below) || ancestors.contains(k)));
        let stale = |k: &String| k.starts_with(&own_values) || k.starts_with(&below);
        lock(&self.value_exists).retain(|k, _| !stale(k));
        lock(&self.values).retain(|k, _| !stale(k));
        trace!("Invalidated cache entries under {}", key);
    }

    fn clear(&self) {
        lock(&self.key_exists).clear();
        lock(&self.value_exists).clear();
        lock(&self.values).clear();
        trace!("Read cache cleared");
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: lock(&self.key_exists).len()
                + lock(&self.value_exists).len()
                + lock(&self.values).len(),
        }
    }
}
