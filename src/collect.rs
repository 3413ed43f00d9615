//! Convenience collectors built on the traversal engine
//!
//! Small wrappers for the common "walk and gather" cases so callers do
//! not have to drive the stream by hand.

use crate::engine::{traverse, WalkOptions};
use crate::error::Result;
use crate::node::{NodeHandle, NodeKey};
use crate::TreeAdapter;
use std::sync::Arc;

/// Walk the tree and collect every `(node, depth)` pair in strategy order
pub async fn collect_nodes(
    root: NodeHandle,
    adapter: Arc<dyn TreeAdapter>,
    options: WalkOptions,
) -> Result<Vec<(NodeHandle, u32)>> {
    let traversal = traverse(root, adapter, options)?;
    traversal.collect().await
}

/// Walk the tree and collect node keys in strategy order
pub async fn collect_keys(
    root: NodeHandle,
    adapter: Arc<dyn TreeAdapter>,
    options: WalkOptions,
) -> Result<Vec<NodeKey>> {
    let nodes = collect_nodes(root, adapter, options).await?;
    Ok(nodes.into_iter().map(|(node, _)| node.key()).collect())
}

/// Count the nodes a walk would emit
pub async fn count_nodes(
    root: NodeHandle,
    adapter: Arc<dyn TreeAdapter>,
    options: WalkOptions,
) -> Result<u64> {
    let mut traversal = traverse(root, adapter, options)?;
    let mut count = 0u64;
    while let Some(item) = traversal.next().await {
        item?;
        count += 1;
    }
    traversal.finish().await?;
    Ok(count)
}

/// Walk the tree and keep the nodes matching a predicate
pub async fn find_nodes(
    root: NodeHandle,
    adapter: Arc<dyn TreeAdapter>,
    options: WalkOptions,
    predicate: impl Fn(&NodeHandle) -> bool,
) -> Result<Vec<NodeHandle>> {
    let mut traversal = traverse(root, adapter, options)?;
    let mut matches = Vec::new();
    while let Some(item) = traversal.next().await {
        let (node, _) = item?;
        if predicate(&node) {
            matches.push(node);
        }
    }
    traversal.finish().await?;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::json::JsonAdapter;
    use serde_json::json;

    fn stack() -> (Arc<JsonAdapter>, NodeHandle) {
        let adapter = Arc::new(JsonAdapter::new(json!({
            "a": {"x": 1, "y": 2},
            "b": [true, false],
        })));
        let root = adapter.root_node();
        (adapter, root)
    }

    #[tokio::test]
    async fn test_count_nodes() {
        let (adapter, root) = stack();
        let count = count_nodes(root, adapter, WalkOptions::new()).await.unwrap();
        // root, a, b, a/x, a/y, b/0, b/1
        assert_eq!(count, 7);
    }

    #[tokio::test]
    async fn test_collect_keys_in_order() {
        let (adapter, root) = stack();
        let keys = collect_keys(root, adapter, WalkOptions::new()).await.unwrap();
        let keys: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        assert_eq!(keys, vec!["$", "/a", "/b", "/a/x", "/a/y", "/b/0", "/b/1"]);
    }

    #[tokio::test]
    async fn test_find_nodes() {
        let (adapter, root) = stack();
        let found = find_nodes(root, adapter, WalkOptions::new(), |node| {
            node.name() == "y"
        })
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key().as_str(), "/a/y");
    }
}
