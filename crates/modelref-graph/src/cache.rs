//! Dependency tree caching
//!
//! Trees are cached per `(key, depth)` and stamped with a fingerprint of the
//! catalog they were computed from. A different fingerprint clears the cache.

use modelref_core::{fold, ModelCatalog};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::tree::DependencyNode;

/// SHA-256 of the serialized catalog
pub fn catalog_fingerprint(catalog: &ModelCatalog) -> String {
    let mut hasher = Sha256::new();
    if serde_json::to_writer(&mut hasher, catalog).is_err() {
        hasher.update(format!("{catalog:?}"));
    }
    hex::encode(hasher.finalize())
}

/// Cache hit/miss counters and entry count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

/// Dependency tree cache tied to one catalog fingerprint
///
/// ## Usage
///
/// ```rust,ignore
/// let cache = AnalysisCache::new();
/// cache.ensure_fingerprint(&catalog_fingerprint(&catalog));
///
/// let tree = cache.get_or_insert_with("Sales[Total]", 3, || graph.dependency_tree_for_key("Sales[Total]", 3));
/// ```
#[derive(Debug, Default)]
pub struct AnalysisCache {
    trees: Arc<RwLock<HashMap<(String, usize), Arc<DependencyNode>>>>,

    /// Fingerprint of the catalog the entries belong to
    fingerprint: RwLock<Option<String>>,

    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(key: &str, depth: usize) -> (String, usize) {
        (fold(key), depth)
    }

    /// Adopt a catalog fingerprint, clearing entries if it changed
    ///
    /// Returns true when the cache was cleared.
    pub fn ensure_fingerprint(&self, fingerprint: &str) -> bool {
        let current = self
            .fingerprint
            .read()
            .ok()
            .and_then(|f| f.clone());
        if current.as_deref() == Some(fingerprint) {
            return false;
        }

        self.clear();
        if let Ok(mut stored) = self.fingerprint.write() {
            *stored = Some(fingerprint.to_string());
        }
        tracing::debug!(fingerprint, "analysis cache reset for new catalog");
        true
    }

    pub fn fingerprint(&self) -> Option<String> {
        self.fingerprint.read().ok().and_then(|f| f.clone())
    }

    pub fn insert(&self, key: &str, depth: usize, tree: DependencyNode) -> Arc<DependencyNode> {
        let tree = Arc::new(tree);
        if let Ok(mut trees) = self.trees.write() {
            trees.insert(Self::cache_key(key, depth), Arc::clone(&tree));
        }
        tree
    }

    pub fn get(&self, key: &str, depth: usize) -> Option<Arc<DependencyNode>> {
        let found = self
            .trees
            .read()
            .ok()
            .and_then(|trees| trees.get(&Self::cache_key(key, depth)).cloned());

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Cached tree, or compute and cache it
    ///
    /// `None` from `compute` is not cached.
    pub fn get_or_insert_with(
        &self,
        key: &str,
        depth: usize,
        compute: impl FnOnce() -> Option<DependencyNode>,
    ) -> Option<Arc<DependencyNode>> {
        if let Some(tree) = self.get(key, depth) {
            return Some(tree);
        }
        compute().map(|tree| self.insert(key, depth, tree))
    }

    /// Drop every entry and forget the fingerprint
    pub fn invalidate(&self) {
        self.clear();
        if let Ok(mut stored) = self.fingerprint.write() {
            *stored = None;
        }
    }

    pub fn clear(&self) {
        if let Ok(mut trees) = self.trees.write() {
            trees.clear();
        }
    }

    pub fn len(&self) -> usize {
        if let Ok(trees) = self.trees.read() {
            trees.len()
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{graph_for, sales_catalog};
    use modelref_core::{Measure, Table};

    #[test]
    fn fingerprint_tracks_catalog_content() {
        let catalog = sales_catalog();
        assert_eq!(catalog_fingerprint(&catalog), catalog_fingerprint(&sales_catalog()));
        assert_eq!(catalog_fingerprint(&catalog).len(), 64);

        let changed = catalog.with_table(Table::new("Extra").with_measure(Measure::new("", "X", "1")));
        assert_ne!(catalog_fingerprint(&changed), catalog_fingerprint(&sales_catalog()));
    }

    #[test]
    fn trees_are_cached_per_depth() {
        let graph = graph_for(&sales_catalog());
        let cache = AnalysisCache::new();

        let first = cache
            .get_or_insert_with("Sales[Profit]", 3, || graph.dependency_tree_for_key("Sales[Profit]", 3))
            .unwrap();
        let again = cache
            .get_or_insert_with("sales[profit]", 3, || panic!("should be cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        assert!(cache.get("Sales[Profit]", 1).is_none());
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 2 });
    }

    #[test]
    fn unknown_keys_are_not_cached() {
        let graph = graph_for(&sales_catalog());
        let cache = AnalysisCache::new();
        assert!(cache
            .get_or_insert_with("Nope[X]", 3, || graph.dependency_tree_for_key("Nope[X]", 3))
            .is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn new_fingerprint_clears_entries() {
        let graph = graph_for(&sales_catalog());
        let cache = AnalysisCache::new();

        assert!(cache.ensure_fingerprint("a"));
        cache.get_or_insert_with("Sales[Revenue]", 2, || graph.dependency_tree_for_key("Sales[Revenue]", 2));
        assert_eq!(cache.len(), 1);

        assert!(!cache.ensure_fingerprint("a"));
        assert_eq!(cache.len(), 1);

        assert!(cache.ensure_fingerprint("b"));
        assert!(cache.is_empty());
        assert_eq!(cache.fingerprint().as_deref(), Some("b"));

        cache.invalidate();
        assert!(cache.fingerprint().is_none());
    }
}
