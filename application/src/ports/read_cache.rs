//! Read cache port
//!
//! Memoizes key-existence, value-existence and value-content lookups keyed by
//! full path. The engine clears it wholesale around applies and invalidates
//! the affected key after each individual write.

use regpilot_domain::{ConfigPath, ConfigValue, KeyPath};
use serde::Serialize;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Path-keyed lookup cache
pub trait ReadCache: Send + Sync {
    fn key_exists(&self, key: &KeyPath) -> Option<bool>;
    fn put_key_exists(&self, key: &KeyPath, exists: bool);

    fn value_exists(&self, path: &ConfigPath) -> Option<bool>;
    fn put_value_exists(&self, path: &ConfigPath, exists: bool);

    /// `Some(None)` is a cached "value absent"
    fn value(&self, path: &ConfigPath) -> Option<Option<ConfigValue>>;
    fn put_value(&self, path: &ConfigPath, value: Option<ConfigValue>);

    /// Drop entries for `key`, its subkeys and values, and the key-existence
    /// entries of its ancestors
    fn invalidate_key(&self, key: &KeyPath);

    /// Drop everything
    fn clear(&self);

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Cache that never stores anything
pub struct NoReadCache;

impl ReadCache for NoReadCache {
    fn key_exists(&self, _key: &KeyPath) -> Option<bool> {
        None
    }
    fn put_key_exists(&self, _key: &KeyPath, _exists: bool) {}

    fn value_exists(&self, _path: &ConfigPath) -> Option<bool> {
        None
    }
    fn put_value_exists(&self, _path: &ConfigPath, _exists: bool) {}

    fn value(&self, _path: &ConfigPath) -> Option<Option<ConfigValue>> {
        None
    }
    fn put_value(&self, _path: &ConfigPath, _value: Option<ConfigValue>) {}

    fn invalidate_key(&self, _key: &KeyPath) {}
    fn clear(&self) {}
}
