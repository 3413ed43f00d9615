//! Node identity and the tree-node contract
//!
//! A node is an opaque handle to a position in some source tree. The
//! engine never looks inside a node beyond this contract: a stable key,
//! a display name, a leaf hint, and optional lazy metadata. Nodes are
//! immutable after creation; depth is attached externally by the engine
//! as `(NodeHandle, depth)` pairs.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Stable, hashable, value-equal identifier of a tree position.
///
/// Keys are cheap to clone and compare; adapters derive them from
/// whatever the source considers identity (a path, a JSON pointer, a
/// primary key). Two nodes with equal keys refer to the same position.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(Arc<str>);

impl NodeKey {
    /// Create a key from anything string-like
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        NodeKey(key.into())
    }

    /// View the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({})", self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        NodeKey::new(key)
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        NodeKey::new(key)
    }
}

/// Contract every tree position must satisfy.
///
/// Produced by adapters, owned by whoever holds the handle. The cache
/// retains clones of handles (they are immutable identity carriers, not
/// ownership-critical resources).
#[async_trait]
pub trait TreeNode: Send + Sync {
    /// Stable identifier for this position
    fn key(&self) -> NodeKey;

    /// Short display name (file name, member key, array index)
    fn name(&self) -> &str;

    /// Whether this node can have children at all.
    ///
    /// Leaves are never dispatched for child enumeration. Defaults to
    /// `true`; adapters that know better (files, JSON scalars) should
    /// say so to save a round trip.
    fn is_expandable(&self) -> bool {
        true
    }

    /// Source-specific metadata, fetched lazily.
    ///
    /// Not required by the engine. Returns `None` when the source has
    /// nothing to say or the lookup fails.
    async fn metadata(&self) -> Option<Value> {
        None
    }
}

/// Shared handle to a node
pub type NodeHandle = Arc<dyn TreeNode>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_equality() {
        let a = NodeKey::from("/data/x");
        let b = NodeKey::new(String::from("/data/x"));
        assert_eq!(a, b);
        assert_ne!(a, NodeKey::from("/data/y"));
    }

    #[test]
    fn test_key_hashing() {
        let mut set = HashSet::new();
        set.insert(NodeKey::from("/a"));
        set.insert(NodeKey::from("/a"));
        set.insert(NodeKey::from("/b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_key_display() {
        let key = NodeKey::from("/data/file.txt");
        assert_eq!(key.to_string(), "/data/file.txt");
        assert_eq!(format!("{key:?}"), "NodeKey(/data/file.txt)");
    }
}
