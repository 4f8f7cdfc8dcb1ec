//! Class-derivation compatibility cache (§4.6 "Class-derivation tests are
//! cached", §9 "the overlay linear in path count times depth").

use htree_metadata::{MetadataError, MetadataInspector};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Caches "does `a` derive from `b`, or vice versa" for the lifetime of one
/// filtering overlay, so repeated path/node comparisons along a wide
/// hierarchy level don't re-query the schema for the same class pair.
#[derive(Default)]
pub struct ClassCompatCache {
    cache: Mutex<HashMap<(String, String), bool>>,
}

impl ClassCompatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `a` and `b` are compatible when equal, or one derives from the other
    /// (§4.6 "Path matching").
    pub async fn compatible(
        &self,
        inspector: &dyn MetadataInspector,
        a: &str,
        b: &str,
    ) -> Result<bool, MetadataError> {
        if a == b {
            return Ok(true);
        }
        let key = (a.to_string(), b.to_string());
        if let Some(v) = self.cache.lock().await.get(&key) {
            return Ok(*v);
        }
        let compatible =
            inspector.class_derives_from(a, b).await? || inspector.class_derives_from(b, a).await?;
        self.cache.lock().await.insert(key, compatible);
        Ok(compatible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use htree_metadata::Schema;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingInspector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataInspector for CountingInspector {
        async fn class_derives_from(&self, derived: &str, base: &str) -> Result<bool, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(derived == "S.Sub" && base == "S.Base")
        }

        async fn get_schema(&self, _name: &str) -> Result<Schema, MetadataError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn repeated_lookups_for_the_same_pair_are_cached() {
        let inspector = CountingInspector {
            calls: AtomicUsize::new(0),
        };
        let cache = ClassCompatCache::new();

        assert!(cache.compatible(&inspector, "S.Sub", "S.Base").await.unwrap());
        assert!(cache.compatible(&inspector, "S.Sub", "S.Base").await.unwrap());

        // One direction hits, but we still probe the reverse once per miss
        // (the first lookup needed both calls since forward-only check may
        // short-circuit) — the point under test is the second lookup makes
        // no further calls at all.
        let after_first = inspector.calls.load(Ordering::SeqCst);
        assert!(cache.compatible(&inspector, "S.Sub", "S.Base").await.unwrap());
        assert_eq!(inspector.calls.load(Ordering::SeqCst), after_first);
    }
}
