//! Adapter protocol and composition model
//!
//! An adapter enumerates the children of a node. Base adapters talk to a
//! concrete source (filesystem, JSON document); decorator adapters wrap
//! another adapter and add behavior (filtering, caching). Every decorator
//! implements the same trait and delegates explicitly; there is no
//! dynamic forwarding.
//!
//! ```text
//!   caller ──▶ CacheAdapter ──▶ FilterAdapter ──▶ FsAdapter ──▶ source
//!                (decorator)       (decorator)       (base)
//! ```
//!
//! The engine's correctness depends only on this contract: `children`
//! produces all direct children exactly once, in a source-deterministic
//! order, and is safe to call concurrently from independent traversals.

pub mod filesystem;
pub mod filter;
pub mod json;

use crate::error::AdapterResult;
use crate::node::NodeHandle;
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How deep below a node's children a scan is (or must be) guaranteed.
///
/// `Levels(0)` means only the direct children are known. `Complete`
/// means the sub-tree is exhaustively known and satisfies any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    /// Guaranteed for this many further levels below the children
    Levels(u32),
    /// The entire sub-tree is known
    Complete,
}

impl Depth {
    /// Direct children only, nothing recursive
    pub const NONE: Depth = Depth::Levels(0);

    /// Check whether a scan of this depth answers a request for `required`
    pub fn satisfies(self, required: Depth) -> bool {
        match (self, required) {
            (Depth::Complete, _) => true,
            (Depth::Levels(_), Depth::Complete) => false,
            (Depth::Levels(have), Depth::Levels(want)) => have >= want,
        }
    }

    /// True for the `Complete` sentinel
    pub fn is_complete(self) -> bool {
        matches!(self, Depth::Complete)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Levels(levels) => write!(f, "{levels}"),
            Depth::Complete => f.write_str("complete"),
        }
    }
}

/// Per-call options for [`TreeAdapter::children`].
///
/// `required_depth` is a hint: how many further levels the caller
/// intends to traverse below the returned children. Base adapters
/// ignore it; the cache adapter uses it for completeness tracking.
/// `use_cache = false` makes caching decorators delegate transparently
/// without reading or writing their tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRequest {
    /// Depth the caller intends to traverse below the children
    pub required_depth: Depth,
    /// Whether caching layers may serve or record this call
    pub use_cache: bool,
}

impl Default for ChildRequest {
    fn default() -> Self {
        ChildRequest {
            required_depth: Depth::NONE,
            use_cache: true,
        }
    }
}

impl ChildRequest {
    /// Direct children only, cache allowed
    pub fn shallow() -> Self {
        Self::default()
    }

    /// Request with an explicit depth hint
    pub fn with_depth(required_depth: Depth) -> Self {
        ChildRequest {
            required_depth,
            use_cache: true,
        }
    }

    /// Same request with caching layers bypassed
    pub fn bypass_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// Monotone counter distinguishing adapter instances within a process
static ADAPTER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque, stable identity tag for an adapter instance.
///
/// Embeds the adapter kind, its configuration, and (for decorators) the
/// identity of the wrapped adapter, plus a process-wide instance
/// counter. Two adapters wrapping the same base with different
/// configuration get distinct tags; so do two identically-configured
/// instances. Derived from configuration, never from memory addresses.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AdapterId(Arc<str>);

impl AdapterId {
    /// Identity for a base adapter
    pub fn new(kind: &str, config: &str) -> Self {
        let seq = ADAPTER_SEQ.fetch_add(1, Ordering::Relaxed);
        AdapterId(format!("{kind}({config})#{seq}").into())
    }

    /// Identity for a decorator, chaining the inner adapter's identity
    pub fn derived(kind: &str, inner: &AdapterId, config: &str) -> Self {
        let seq = ADAPTER_SEQ.fetch_add(1, Ordering::Relaxed);
        AdapterId(format!("{kind}({config})<{inner}>#{seq}").into())
    }

    /// View the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdapterId({})", self.0)
    }
}

/// Digest a configuration string into a compact stable tag.
///
/// Used for predicate labels and cache scope tags. SHA-256 truncated to
/// 64 bits; stable across runs and platforms.
pub(crate) fn config_digest(config: &str) -> u64 {
    let digest = Sha256::digest(config.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(buf)
}

/// Child-enumeration contract implemented by every adapter.
///
/// Implementations must be safe to call concurrently from independent
/// traversals; per-call resources (directory handles, cursors) must not
/// be shared across calls. No ordering or concurrency guarantees beyond
/// "children is complete and deterministic per node"; global ordering
/// is the engine's job.
#[async_trait]
pub trait TreeAdapter: Send + Sync {
    /// Enumerate all direct children of `node`, exactly once each, in a
    /// source-defined deterministic order (sorted by key unless the
    /// source has an intrinsic order).
    ///
    /// Fails with [`AdapterError::SourceUnavailable`] when the source
    /// cannot be read and [`AdapterError::NodeGone`] when the node no
    /// longer exists. Errors are per-node, not fatal to a traversal.
    ///
    /// [`AdapterError::SourceUnavailable`]: crate::error::AdapterError::SourceUnavailable
    /// [`AdapterError::NodeGone`]: crate::error::AdapterError::NodeGone
    async fn children(&self, node: &NodeHandle, req: ChildRequest) -> AdapterResult<Vec<NodeHandle>>;

    /// Stable identity tag for the lifetime of this instance
    fn identity(&self) -> AdapterId;

    /// Source-specific metadata for a node; not required by the engine
    async fn metadata(&self, node: &NodeHandle) -> Option<Value> {
        node.metadata().await
    }
}
