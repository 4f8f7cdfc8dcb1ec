//! Two-tier LRU cache for materialized hierarchy levels (§4.7).
//!
//! Tier 1 keys by parent fingerprint (the parent node's serialized key, or
//! `"root"`). Tier 2, within a parent's entry, keys by the
//! `(instanceFilter, sizeLimit)` variation that produced the cached level.
//! Both tiers evict least-recently-used once their configured capacity is
//! exceeded, mirroring how RPG's own query-result caches are shaped.

use hashlink::LinkedHashMap;
use htree_core::{HierConfig, Node};
use htree_definition::HierarchyLevelParent;
use htree_query::{GenericInstanceFilter, RowLimit};
use std::sync::Mutex;

/// The tier-2 key: a variation of a parent's children by instance filter and
/// row limit. Both are collapsed to plain, hashable values so the cache
/// doesn't need `Eq`/`Hash` on the richer domain types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VariationKey {
    filter: Option<String>,
    row_limit: Option<usize>,
}

impl VariationKey {
    fn new(instance_filter: Option<&GenericInstanceFilter>, row_limit: RowLimit) -> Self {
        Self {
            filter: instance_filter
                .map(|f| serde_json::to_string(f).unwrap_or_default()),
            row_limit: row_limit.as_usize(),
        }
    }
}

/// Fingerprint a parent as the tier-1 cache key.
fn parent_fingerprint(parent: &HierarchyLevelParent) -> String {
    match parent {
        HierarchyLevelParent::Root => "root".to_string(),
        HierarchyLevelParent::Node(node) => {
            serde_json::to_string(&node.key).unwrap_or_else(|_| "root".to_string())
        }
    }
}

struct Entry {
    variations: LinkedHashMap<VariationKey, Vec<Node>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            variations: LinkedHashMap::new(),
        }
    }
}

/// The child-nodes cache (§4.7).
///
/// Cloning nodes out of and into the cache is deliberate: [`Node`] is cheap
/// to clone relative to re-running a query, and keeping owned copies avoids
/// any lifetime coupling between cache entries and the pipeline that filled
/// them.
pub struct HierarchyCache {
    parents: Mutex<LinkedHashMap<String, Entry>>,
    max_parents: usize,
    max_variations_per_parent: usize,
}

impl HierarchyCache {
    pub fn new(config: &HierConfig) -> Self {
        Self {
            parents: Mutex::new(LinkedHashMap::new()),
            max_parents: config.cache.max_parents,
            max_variations_per_parent: config.cache.max_variations_per_parent,
        }
    }

    /// Looks up a previously cached level. Returns `None` on any miss,
    /// including when `ignore_cache` is set (the caller still re-fills via
    /// [`Self::put`], keeping the entry fresh for later callers).
    pub fn get(
        &self,
        parent: &HierarchyLevelParent,
        instance_filter: Option<&GenericInstanceFilter>,
        row_limit: RowLimit,
        ignore_cache: bool,
    ) -> Option<Vec<Node>> {
        if ignore_cache {
            return None;
        }
        let key = VariationKey::new(instance_filter, row_limit);
        let fingerprint = parent_fingerprint(parent);

        let mut parents = self.parents.lock().unwrap_or_else(|e| e.into_inner());
        parents.to_back(&fingerprint);
        let entry = parents.get_mut(&fingerprint)?;
        entry.variations.to_back(&key);
        entry.variations.get(&key).cloned()
    }

    /// Inserts (or replaces) the materialized level for `parent` under the
    /// given variation, evicting the least-recently-used parent and/or
    /// variation if capacity is exceeded.
    pub fn put(
        &self,
        parent: &HierarchyLevelParent,
        instance_filter: Option<&GenericInstanceFilter>,
        row_limit: RowLimit,
        nodes: Vec<Node>,
    ) {
        let key = VariationKey::new(instance_filter, row_limit);
        let fingerprint = parent_fingerprint(parent);

        let mut parents = self.parents.lock().unwrap_or_else(|e| e.into_inner());

        if !parents.contains_key(&fingerprint) && parents.len() >= self.max_parents {
            parents.pop_front();
        }
        let entry = parents
            .entry(fingerprint.clone())
            .or_insert_with(Entry::new);
        parents.to_back(&fingerprint);

        if !entry.variations.contains_key(&key) && entry.variations.len() >= self.max_variations_per_parent {
            entry.variations.pop_front();
        }
        entry.variations.insert(key, nodes);
    }

    /// Drops every cached level. Called when a formatter or filter change
    /// invalidates every previously materialized label/grouping (§4.7
    /// "Invalidation").
    pub fn clear(&self) {
        self.parents.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Drops only the entries cached under `parent`, leaving sibling
    /// subtrees untouched.
    pub fn invalidate_parent(&self, parent: &HierarchyLevelParent) {
        let fingerprint = parent_fingerprint(parent);
        self.parents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&fingerprint);
    }

    pub fn len(&self) -> usize {
        self.parents.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htree_core::{Children, NodeKey};

    fn root_node(id: &str) -> Node {
        Node::new_instance(NodeKey::generic(id), id, vec![])
    }

    fn config(max_parents: usize, max_variations: usize) -> HierConfig {
        let mut config = HierConfig::default();
        config.cache.max_parents = max_parents;
        config.cache.max_variations_per_parent = max_variations;
        config
    }

    #[test]
    fn miss_on_empty_cache() {
        let cache = HierarchyCache::new(&config(4, 2));
        assert!(
            cache
                .get(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, false)
                .is_none()
        );
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = HierarchyCache::new(&config(4, 2));
        let nodes = vec![root_node("a")];
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, nodes.clone());

        let hit = cache
            .get(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, false)
            .unwrap();
        assert_eq!(hit.len(), 1);
        assert!(matches!(hit[0].children, Children::Unknown));
    }

    #[test]
    fn ignore_cache_forces_a_miss() {
        let cache = HierarchyCache::new(&config(4, 2));
        cache.put(
            &HierarchyLevelParent::Root,
            None,
            RowLimit::Unbounded,
            vec![root_node("a")],
        );
        assert!(
            cache
                .get(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, true)
                .is_none()
        );
    }

    #[test]
    fn distinct_row_limits_are_distinct_variations() {
        let cache = HierarchyCache::new(&config(4, 2));
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, vec![root_node("a")]);
        cache.put(
            &HierarchyLevelParent::Root,
            None,
            RowLimit::Bounded(10),
            vec![root_node("a"), root_node("b")],
        );

        let unbounded = cache
            .get(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, false)
            .unwrap();
        let bounded = cache
            .get(&HierarchyLevelParent::Root, None, RowLimit::Bounded(10), false)
            .unwrap();
        assert_eq!(unbounded.len(), 1);
        assert_eq!(bounded.len(), 2);
    }

    #[test]
    fn evicts_oldest_parent_beyond_capacity() {
        let cache = HierarchyCache::new(&config(2, 2));
        let parent_a = HierarchyLevelParent::Node(root_node("a"));
        let parent_b = HierarchyLevelParent::Node(root_node("b"));
        let parent_c = HierarchyLevelParent::Node(root_node("c"));

        cache.put(&parent_a, None, RowLimit::Unbounded, vec![]);
        cache.put(&parent_b, None, RowLimit::Unbounded, vec![]);
        cache.put(&parent_c, None, RowLimit::Unbounded, vec![]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&parent_a, None, RowLimit::Unbounded, false).is_none());
        assert!(cache.get(&parent_c, None, RowLimit::Unbounded, false).is_some());
    }

    #[test]
    fn getting_a_parent_protects_it_from_eviction() {
        let cache = HierarchyCache::new(&config(2, 2));
        let parent_a = HierarchyLevelParent::Node(root_node("a"));
        let parent_b = HierarchyLevelParent::Node(root_node("b"));
        let parent_c = HierarchyLevelParent::Node(root_node("c"));

        cache.put(&parent_a, None, RowLimit::Unbounded, vec![]);
        cache.put(&parent_b, None, RowLimit::Unbounded, vec![]);
        // touch a, so b becomes the least-recently-used entry
        cache.get(&parent_a, None, RowLimit::Unbounded, false);
        cache.put(&parent_c, None, RowLimit::Unbounded, vec![]);

        assert!(cache.get(&parent_a, None, RowLimit::Unbounded, false).is_some());
        assert!(cache.get(&parent_b, None, RowLimit::Unbounded, false).is_none());
    }

    #[test]
    fn evicts_oldest_variation_beyond_per_parent_capacity() {
        let cache = HierarchyCache::new(&config(4, 2));
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Bounded(1), vec![]);
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Bounded(2), vec![]);
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Bounded(3), vec![]);

        assert!(
            cache
                .get(&HierarchyLevelParent::Root, None, RowLimit::Bounded(1), false)
                .is_none()
        );
        assert!(
            cache
                .get(&HierarchyLevelParent::Root, None, RowLimit::Bounded(3), false)
                .is_some()
        );
    }

    #[test]
    fn clear_empties_every_parent() {
        let cache = HierarchyCache::new(&config(4, 2));
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, vec![root_node("a")]);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_parent_only_drops_that_parent() {
        let cache = HierarchyCache::new(&config(4, 2));
        let parent_a = HierarchyLevelParent::Node(root_node("a"));
        cache.put(&parent_a, None, RowLimit::Unbounded, vec![]);
        cache.put(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, vec![]);

        cache.invalidate_parent(&parent_a);

        assert!(cache.get(&parent_a, None, RowLimit::Unbounded, false).is_none());
        assert!(
            cache
                .get(&HierarchyLevelParent::Root, None, RowLimit::Unbounded, false)
                .is_some()
        );
    }
}
