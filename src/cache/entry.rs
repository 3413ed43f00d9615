//! Cache keys, entries, and validator tokens

use crate::adapter::Depth;
use crate::node::{NodeHandle, NodeKey};
use std::fmt;
use std::time::{Duration, Instant};

/// Opaque source-level change token, compared for equality only.
///
/// Typically derived from a modification timestamp or revision marker.
/// Tokens are never ordered; a mismatch means the source changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorToken(u64);

impl ValidatorToken {
    /// Wrap a raw token value
    pub fn new(raw: u64) -> Self {
        ValidatorToken(raw)
    }

    /// The raw token value
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Key of the completeness table: node identity plus the scope tag of
/// the cache layer, so stacked caches over different adapter stacks
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub(crate) node: NodeKey,
    pub(crate) scope: u64,
}

impl CacheKey {
    pub(crate) fn new(node: NodeKey, scope: u64) -> Self {
        CacheKey { node, scope }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:016x}", self.node, self.scope)
    }
}

/// One published scan result.
///
/// `depth_scanned = d` means the children were enumerated and, for each
/// sub-tree rooted at a child, enumeration is guaranteed down to `d - 1`
/// further levels within the same cache, provided every transitively
/// required entry is still present and valid. Entries are published
/// atomically and whole; `inserted_at` and `validator` reflect the scan
/// that produced the entry and are never rewritten on a hit.
#[derive(Clone)]
pub struct CacheEntry {
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) depth_scanned: Depth,
    pub(crate) inserted_at: Instant,
    pub(crate) validator: Option<ValidatorToken>,
}

impl CacheEntry {
    pub(crate) fn new(
        children: Vec<NodeHandle>,
        depth_scanned: Depth,
        validator: Option<ValidatorToken>,
    ) -> Self {
        CacheEntry {
            children,
            depth_scanned,
            inserted_at: Instant::now(),
            validator,
        }
    }

    /// Whether this entry answers a request for `required` depth
    pub fn satisfies(&self, required: Depth) -> bool {
        self.depth_scanned.satisfies(required)
    }

    /// Depth guaranteed by the scan that produced this entry
    pub fn depth_scanned(&self) -> Depth {
        self.depth_scanned
    }

    /// Time since the entry was published
    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("children", &self.children.len())
            .field("depth_scanned", &self.depth_scanned)
            .field("validator", &self.validator)
            .finish()
    }
}
