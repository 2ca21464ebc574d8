//! Generation cache: deterministic keys, stored fragments, single-flight.
//!
//! The key is a projection of the captured context — trigger id, trigger
//! label, normalized user input, parent id, and the sorted sibling id set.
//! Everything else in a context (timestamps, snapshots, environment) is
//! deliberately excluded, so two captures of the same interaction hit the
//! same entry no matter when they happen.
//!
//! Writes are last-writer-wins. There is no eviction: entries are small and
//! keyed by interaction, and hosts that care hand in a store with its own
//! lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use burgeon_types::{ComponentNode, GenerationContext, NodeId};

use crate::backend::{GenResult, KvStore};

/// A deterministic cache key derived from a generation context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a context.
///
/// Pure over the projected fields: equal projections give equal keys, and
/// any differing projected field gives a different key.
pub fn derive_key(context: &GenerationContext) -> CacheKey {
    let input = normalize_input(context.user_input().unwrap_or(""));
    let parent = context
        .parent_id()
        .map(NodeId::as_str)
        .unwrap_or("");
    let mut siblings: Vec<&str> = context.sibling_ids().iter().map(|i| i.as_str()).collect();
    siblings.sort_unstable();
    CacheKey(format!(
        "gen:{}|{}|{}|{}|{}",
        context.trigger_id(),
        context.trigger_label(),
        input,
        parent,
        siblings.join(",")
    ))
}

/// Normalize user input for keying: trim, collapse whitespace runs to a
/// single space. Case is preserved — "Search" and "search" are different
/// requests as far as the backend is concerned.
pub(crate) fn normalize_input(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One cached generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub fragment: ComponentNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub created_at: u64,
}

impl CacheEntry {
    /// Equality ignoring `created_at`, for comparing re-generations.
    pub fn content_eq(&self, other: &CacheEntry) -> bool {
        self.key == other.key
            && self.fragment == other.fragment
            && self.reasoning == other.reasoning
    }
}

/// Fragment cache over an arbitrary [`KvStore`], with per-key single-flight
/// locks so concurrent identical misses produce one backend call.
pub struct GenerationCache {
    store: Arc<dyn KvStore>,
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl GenerationCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            inflight: DashMap::new(),
        }
    }

    /// Look up a cached generation.
    ///
    /// A stored value that no longer parses is treated as a miss (logged),
    /// not an error — regenerating is always a valid answer.
    pub fn get(&self, key: &CacheKey) -> GenResult<Option<CacheEntry>> {
        let Some(raw) = self.store.get(key.as_str())? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding unparseable cache entry");
                Ok(None)
            }
        }
    }

    /// Store a generation under its key. Overwrites any previous entry.
    pub fn put(
        &self,
        key: &CacheKey,
        fragment: ComponentNode,
        reasoning: Option<String>,
    ) -> GenResult<()> {
        let entry = CacheEntry {
            key: key.clone(),
            fragment,
            reasoning,
            created_at: crate::now_millis(),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|e| crate::backend::GenError::Store(e.to_string()))?;
        self.store.put(key.as_str(), &raw)
    }

    /// The single-flight lock for a key. Callers hold it across the
    /// probe-generate-store sequence so a concurrent identical trigger
    /// waits and then hits the freshly stored entry.
    pub fn lock_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the single-flight entry for `key` once no caller holds its lock,
    /// so the table is bounded by concurrent generations rather than by
    /// every key ever seen. A no-op while another caller still holds it.
    pub fn release(&self, key: &CacheKey) {
        self.inflight
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use burgeon_types::{
        ComponentNodeBuilder, GenerationContext, MinimalContext, StandardContext, TriggerElement,
    };

    fn standard_ctx(id: &str, input: Option<&str>) -> GenerationContext {
        GenerationContext::Standard(StandardContext {
            trigger: TriggerElement {
                id: NodeId::new(id),
                kind: "button".into(),
                attributes: Default::default(),
            },
            user_input: input.map(String::from),
        })
    }

    // ── Key derivation ──────────────────────────────────────────────────

    #[test]
    fn test_normalize_input() {
        assert_eq!(normalize_input("  search   cats \n"), "search cats");
        assert_eq!(normalize_input("Search Cats"), "Search Cats");
        assert_eq!(normalize_input(""), "");
    }

    #[test]
    fn test_equal_projection_equal_key() {
        let a = standard_ctx("btn-1", Some("search cats"));
        let b = standard_ctx("btn-1", Some("  search\tcats "));
        assert_eq!(derive_key(&a), derive_key(&b));
    }

    #[test]
    fn test_differing_fields_differ_key() {
        let base = standard_ctx("btn-1", Some("search cats"));
        assert_ne!(
            derive_key(&base),
            derive_key(&standard_ctx("btn-2", Some("search cats")))
        );
        assert_ne!(
            derive_key(&base),
            derive_key(&standard_ctx("btn-1", Some("search dogs")))
        );
        assert_ne!(
            derive_key(&base),
            derive_key(&standard_ctx("btn-1", None))
        );
    }

    #[test]
    fn test_error_and_interaction_triggers_never_collide() {
        let interaction = standard_ctx("node-1", None);
        let error = GenerationContext::Minimal(MinimalContext {
            trigger_id: NodeId::new("node-1"),
            element_kind: "card".into(),
            error_message: None,
        });
        assert_ne!(derive_key(&interaction), derive_key(&error));
    }

    #[test]
    fn test_sibling_order_does_not_matter() {
        use burgeon_types::{RichContext, TreeSummary};
        let rich = |sibs: Vec<&str>| {
            GenerationContext::Rich(RichContext {
                standard: StandardContext {
                    trigger: TriggerElement {
                        id: NodeId::new("btn-1"),
                        kind: "button".into(),
                        attributes: Default::default(),
                    },
                    user_input: None,
                },
                sibling_fragments: sibs
                    .into_iter()
                    .map(|id| ComponentNodeBuilder::new("card").id(id).build())
                    .collect(),
                parent_fragment: None,
                tree_summary: TreeSummary::default(),
            })
        };
        assert_eq!(
            derive_key(&rich(vec!["a", "b"])),
            derive_key(&rich(vec!["b", "a"]))
        );
    }

    // ── Cache over a store ──────────────────────────────────────────────

    #[test]
    fn test_cache_put_get_roundtrip() {
        let cache = GenerationCache::new(Arc::new(MemoryStore::new()));
        let key = derive_key(&standard_ctx("btn-1", Some("go")));
        assert!(cache.get(&key).unwrap().is_none());

        let fragment = ComponentNodeBuilder::new("card").id("frag-1").build();
        cache.put(&key, fragment.clone(), Some("because".into())).unwrap();

        let entry = cache.get(&key).unwrap().expect("hit");
        assert_eq!(entry.fragment, fragment);
        assert_eq!(entry.reasoning.as_deref(), Some("because"));
        assert!(entry.created_at > 0);
    }

    #[test]
    fn test_cache_overwrite_last_writer_wins() {
        let cache = GenerationCache::new(Arc::new(MemoryStore::new()));
        let key = derive_key(&standard_ctx("btn-1", None));
        cache
            .put(&key, ComponentNodeBuilder::new("card").id("old").build(), None)
            .unwrap();
        cache
            .put(&key, ComponentNodeBuilder::new("card").id("new").build(), None)
            .unwrap();
        let entry = cache.get(&key).unwrap().unwrap();
        assert_eq!(entry.fragment.id.as_str(), "new");
    }

    #[test]
    fn test_content_eq_ignores_created_at() {
        let key = derive_key(&standard_ctx("btn-1", None));
        let fragment = ComponentNodeBuilder::new("card").id("f").build();
        let a = CacheEntry {
            key: key.clone(),
            fragment: fragment.clone(),
            reasoning: None,
            created_at: 1,
        };
        let b = CacheEntry {
            key,
            fragment,
            reasoning: None,
            created_at: 2,
        };
        assert!(a.content_eq(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_unparseable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let key = derive_key(&standard_ctx("btn-1", None));
        store.put(key.as_str(), "{not json").unwrap();

        let cache = GenerationCache::new(store);
        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_lock_for_returns_same_lock_per_key() {
        let cache = GenerationCache::new(Arc::new(MemoryStore::new()));
        let key = derive_key(&standard_ctx("btn-1", None));
        let a = cache.lock_for(&key);
        let b = cache.lock_for(&key);
        assert!(Arc::ptr_eq(&a, &b));

        let other = derive_key(&standard_ctx("btn-2", None));
        assert!(!Arc::ptr_eq(&a, &cache.lock_for(&other)));
    }

    #[test]
    fn test_release_drops_idle_single_flight_entry() {
        let cache = GenerationCache::new(Arc::new(MemoryStore::new()));
        let key = derive_key(&standard_ctx("btn-1", None));

        let lock = cache.lock_for(&key);
        cache.release(&key);
        // Still held by a caller, so the entry survives.
        assert!(Arc::ptr_eq(&lock, &cache.lock_for(&key)));

        let weak = Arc::downgrade(&lock);
        drop(lock);
        cache.release(&key);
        assert!(weak.upgrade().is_none());
    }
}
