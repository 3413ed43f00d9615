//! Filtering decorator
//!
//! Wraps any adapter and drops children failing an inclusion predicate.
//! The wrapper never mutates the inner adapter's state; it only narrows
//! what is reported upward. Its identity incorporates the inner
//! identity plus a digest of the predicate label, so cache layers above
//! and below a filter never share entries.
//!
//! Composition order matters and both orders are legal:
//! - `Cache(Filter(base))`: the filter narrows what is cached
//! - `Filter(Cache(base))`: the cache holds the full child sets and the
//!   filter hides entries from callers without shrinking cache content

use crate::adapter::{config_digest, AdapterId, ChildRequest, TreeAdapter};
use crate::error::AdapterResult;
use crate::node::NodeHandle;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Inclusion predicate: return `true` to keep a node
pub type NodePredicate = Arc<dyn Fn(&NodeHandle) -> bool + Send + Sync>;

/// Decorator applying an inclusion predicate to reported children
pub struct FilterAdapter {
    inner: Arc<dyn TreeAdapter>,
    predicate: NodePredicate,
    id: AdapterId,
    filtered_out: AtomicU64,
}

impl FilterAdapter {
    /// Wrap `inner`, keeping only children for which `predicate` is true.
    ///
    /// The predicate gets an anonymous identity label; prefer
    /// [`FilterAdapter::with_label`] when two differently-configured
    /// filters may wrap the same inner adapter under separate caches.
    pub fn new(inner: Arc<dyn TreeAdapter>, predicate: NodePredicate) -> Self {
        Self::with_label(inner, predicate, "anonymous")
    }

    /// Wrap `inner` with a labeled predicate.
    ///
    /// The label is digested into the adapter identity; use a string
    /// that captures the predicate configuration (e.g. `"ext=.rs"`).
    pub fn with_label(inner: Arc<dyn TreeAdapter>, predicate: NodePredicate, label: &str) -> Self {
        let digest = config_digest(label);
        let id = AdapterId::derived("filter", &inner.identity(), &format!("pred={digest:016x}"));
        FilterAdapter {
            inner,
            predicate,
            id,
            filtered_out: AtomicU64::new(0),
        }
    }

    /// Number of children dropped by the predicate so far (advisory)
    pub fn filtered_out(&self) -> u64 {
        self.filtered_out.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TreeAdapter for FilterAdapter {
    async fn children(&self, node: &NodeHandle, req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        let children = self.inner.children(node, req).await?;
        let total = children.len();
        let kept: Vec<NodeHandle> = children
            .into_iter()
            .filter(|child| (self.predicate)(child))
            .collect();
        let dropped = (total - kept.len()) as u64;
        if dropped > 0 {
            self.filtered_out.fetch_add(dropped, Ordering::Relaxed);
        }
        Ok(kept)
    }

    fn identity(&self) -> AdapterId {
        self.id.clone()
    }

    async fn metadata(&self, node: &NodeHandle) -> Option<Value> {
        self.inner.metadata(node).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::json::JsonAdapter;
    use serde_json::json;

    fn adapter() -> (Arc<JsonAdapter>, NodeHandle) {
        let adapter = Arc::new(JsonAdapter::new(json!({
            "keep_a": 1,
            "drop_b": 2,
            "keep_c": {"drop_d": 3},
        })));
        let root = adapter.root_node();
        (adapter, root)
    }

    #[tokio::test]
    async fn test_children_filtered() {
        let (inner, root) = adapter();
        let filter = FilterAdapter::with_label(
            inner,
            Arc::new(|node: &NodeHandle| node.name().starts_with("keep")),
            "prefix=keep",
        );
        let children = filter
            .children(&root, ChildRequest::default())
            .await
            .unwrap();
        let names: Vec<&str> = children.iter().map(|child| child.name()).collect();
        assert_eq!(names, vec!["keep_a", "keep_c"]);
        assert_eq!(filter.filtered_out(), 1);
    }

    #[tokio::test]
    async fn test_identity_distinct_from_inner() {
        let (inner, _root) = adapter();
        let inner_id = inner.identity();
        let filter =
            FilterAdapter::with_label(inner, Arc::new(|_: &NodeHandle| true), "keep=all");
        let filter_id = filter.identity();
        assert_ne!(inner_id, filter_id);
        assert!(filter_id.as_str().contains(inner_id.as_str()));
    }

    #[tokio::test]
    async fn test_distinct_labels_distinct_identities() {
        let (inner, _root) = adapter();
        let inner_clone = Arc::clone(&inner) as Arc<dyn TreeAdapter>;
        let a = FilterAdapter::with_label(inner_clone, Arc::new(|_: &NodeHandle| true), "keep=a");
        let b = FilterAdapter::with_label(inner, Arc::new(|_: &NodeHandle| true), "keep=b");
        assert_ne!(a.identity(), b.identity());
    }
}
