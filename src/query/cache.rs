//! Per-repository cache of compiled templates.

use crate::query::compiler::CompiledQuery;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a cached template within one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Cow<'static, str>);

impl QueryKey {
    pub const fn from_static(key: &'static str) -> Self {
        QueryKey(Cow::Borrowed(key))
    }

    pub fn new(key: impl Into<String>) -> Self {
        QueryKey(Cow::Owned(key.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for QueryKey {
    fn from(key: &'static str) -> Self {
        QueryKey::from_static(key)
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        QueryKey::new(key)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Compiled templates keyed by [`QueryKey`].
///
/// Entries are never evicted. Two tasks compiling the same key at once both
/// insert; the templates are identical, so the last write wins.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Arc<CompiledQuery>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<Arc<CompiledQuery>> {
        let found = self.entries.read().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, key: QueryKey, compiled: CompiledQuery) -> Arc<CompiledQuery> {
        let compiled = Arc::new(compiled);
        self.entries.write().insert(key, compiled.clone());
        compiled
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every template and reset the counters.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::builder::select;
    use crate::query::compiler::{Dialect, compile};

    fn compiled() -> CompiledQuery {
        compile(&select("users").filter_eq("id", "id").into(), Dialect::Sqlite).unwrap()
    }

    #[test]
    fn test_insert_then_get() {
        let cache = QueryCache::new();
        let key = QueryKey::from_static("get_by_id");
        assert!(cache.get(&key).is_none());

        let stored = cache.insert(key.clone(), compiled());
        let fetched = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&stored, &fetched));
        assert_eq!(cache.stats(), CacheStats { size: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_keys_are_distinct() {
        let cache = QueryCache::new();
        cache.insert("get_by_id".into(), compiled());
        cache.insert(QueryKey::new(String::from("insert")), compiled());
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&QueryKey::from("insert")));
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::new();
        cache.insert("get_by_id".into(), compiled());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(QueryKey::from_static("delete_all").to_string(), "delete_all");
    }
}
