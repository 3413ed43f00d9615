//! Breadth-first driver
//!
//! Processes the frontier level by level. Child fetches for a level are
//! dispatched into an ordered completion stream, at most `batch_size`
//! queued at once and `max_concurrent` running anywhere, so completions
//! arrive in dispatch order: children stream out grouped by parent in
//! adapter order while later parents are still being enumerated.

use crate::engine::{DriveEnd, WalkContext};
use crate::node::NodeHandle;
use futures::stream::{FuturesOrdered, StreamExt};

pub(crate) async fn run(cx: &mut WalkContext, root: NodeHandle) -> DriveEnd {
    if let Err(end) = cx.emit(root.clone(), 0).await {
        return end;
    }
    let mut level: Vec<NodeHandle> = vec![root];
    let mut depth = 0u32;

    while !level.is_empty() {
        if !cx.should_expand(depth) {
            break;
        }
        let child_depth = depth + 1;
        let mut next_level: Vec<NodeHandle> = Vec::new();
        let mut pending = FuturesOrdered::new();
        let mut queue = level.into_iter();

        loop {
            // Top up the dispatch window
            while pending.len() < cx.batch_size {
                let Some(node) = queue.next() else { break };
                if !node.is_expandable() {
                    continue;
                }
                pending.push_back(cx.fetch(node, child_depth));
            }
            let Some((parent, result)) = pending.next().await else {
                break;
            };
            cx.stats.record_expanded();
            match result {
                Ok(children) => {
                    for child in children {
                        if let Err(end) = cx.emit(child.clone(), child_depth).await {
                            return end;
                        }
                        next_level.push(child);
                    }
                }
                Err(error) => {
                    if let Some(end) = cx.fail(parent.key(), depth, error).await {
                        return end;
                    }
                }
            }
            if cx.cancelled() {
                return DriveEnd::Cancelled;
            }
        }

        level = next_level;
        depth = child_depth;
    }
    DriveEnd::Finished
}
