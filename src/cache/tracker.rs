//! Auxiliary per-node completeness records
//!
//! Separate from the completeness table: records the deepest scan known
//! for every node the cache has expanded, surviving entry eviction as a
//! cheap "have we been here" signal. Bounded by `max_tracked_nodes` in
//! safe mode with the same LRU policy as the main table; unbounded in
//! fast mode.

use crate::adapter::Depth;
use crate::node::NodeKey;
use lru::LruCache;
use std::num::NonZeroUsize;

pub(crate) struct NodeTracker {
    map: LruCache<NodeKey, Depth>,
}

impl NodeTracker {
    pub(crate) fn bounded(max_tracked_nodes: NonZeroUsize) -> Self {
        NodeTracker {
            map: LruCache::new(max_tracked_nodes),
        }
    }

    pub(crate) fn unbounded() -> Self {
        NodeTracker {
            map: LruCache::unbounded(),
        }
    }

    /// Record a scan of `key` at `depth`, keeping the deeper of the two
    /// when the node was already tracked.
    pub(crate) fn record(&mut self, key: &NodeKey, depth: Depth) {
        match self.map.get_mut(key) {
            Some(known) if known.satisfies(depth) => {}
            Some(known) => *known = depth,
            None => {
                self.map.push(key.clone(), depth);
            }
        }
    }

    pub(crate) fn scan_depth(&self, key: &NodeKey) -> Option<Depth> {
        self.map.peek(key).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }
}
