//! Depth-first drivers (pre- and post-order)
//!
//! An explicit stack of frames replaces recursion: pre-order emits a
//! node when it is reached, post-order when its frame pops. Sibling
//! groups are warmed by a prefetcher that spawns bounded child fetches
//! for the next expandable siblings while the current subtree drains;
//! results are claimed by node key when the walk reaches them, and
//! unclaimed fetches are aborted when the walk stops early.

use crate::engine::{DriveEnd, WalkContext};
use crate::error::AdapterResult;
use crate::node::{NodeHandle, NodeKey};
use std::collections::{HashMap, VecDeque};
use tokio::task::JoinHandle;

struct Frame {
    node: NodeHandle,
    depth: u32,
    children: VecDeque<NodeHandle>,
}

/// Speculative child fetches keyed by node identity
struct Prefetcher {
    tasks: HashMap<NodeKey, JoinHandle<(NodeHandle, AdapterResult<Vec<NodeHandle>>)>>,
}

impl Prefetcher {
    fn new() -> Self {
        Prefetcher {
            tasks: HashMap::new(),
        }
    }

    /// Start enumerating `node`'s children in the background
    fn schedule(&mut self, cx: &WalkContext, node: &NodeHandle, node_depth: u32) {
        if !node.is_expandable() {
            return;
        }
        let key = node.key();
        if self.tasks.contains_key(&key) {
            return;
        }
        let fetch = cx.fetch(node.clone(), node_depth + 1);
        self.tasks.insert(key, tokio::spawn(fetch));
    }

    /// Use the prefetched result when present, fetch directly otherwise
    async fn claim(
        &mut self,
        cx: &WalkContext,
        node: NodeHandle,
        node_depth: u32,
    ) -> AdapterResult<Vec<NodeHandle>> {
        if let Some(handle) = self.tasks.remove(&node.key()) {
            if let Ok((_, result)) = handle.await {
                return result;
            }
            // Prefetch task died; fall through to a direct fetch
        }
        let (_, result) = cx.fetch(node, node_depth + 1).await;
        result
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

pub(crate) async fn run(cx: &mut WalkContext, root: NodeHandle, post_order: bool) -> DriveEnd {
    let mut prefetch = Prefetcher::new();
    let end = walk(cx, &mut prefetch, root, post_order).await;
    prefetch.abort_all();
    end
}

async fn walk(
    cx: &mut WalkContext,
    prefetch: &mut Prefetcher,
    root: NodeHandle,
    post_order: bool,
) -> DriveEnd {
    if !post_order {
        if let Err(end) = cx.emit(root.clone(), 0).await {
            return end;
        }
    }

    let root_children: VecDeque<NodeHandle> = if cx.should_expand(0) && root.is_expandable() {
        let result = prefetch.claim(cx, root.clone(), 0).await;
        cx.stats.record_expanded();
        match result {
            Ok(children) => children.into(),
            Err(error) => {
                if let Some(end) = cx.fail(root.key(), 0, error).await {
                    return end;
                }
                VecDeque::new()
            }
        }
    } else {
        VecDeque::new()
    };
    let mut stack = vec![Frame {
        node: root,
        depth: 0,
        children: root_children,
    }];

    enum Step {
        Pop,
        Descend {
            child: NodeHandle,
            depth: u32,
            lookahead: Vec<NodeHandle>,
        },
    }

    loop {
        if cx.cancelled() {
            return DriveEnd::Cancelled;
        }
        let step = {
            let Some(top) = stack.last_mut() else { break };
            match top.children.pop_front() {
                Some(child) => {
                    let lookahead: Vec<NodeHandle> = top
                        .children
                        .iter()
                        .take(cx.batch_size.saturating_sub(1))
                        .cloned()
                        .collect();
                    Step::Descend {
                        child,
                        depth: top.depth + 1,
                        lookahead,
                    }
                }
                None => Step::Pop,
            }
        };

        match step {
            Step::Pop => {
                if let Some(frame) = stack.pop() {
                    if post_order {
                        if let Err(end) = cx.emit(frame.node, frame.depth).await {
                            return end;
                        }
                    }
                }
            }
            Step::Descend {
                child,
                depth,
                lookahead,
            } => {
                if !post_order {
                    if let Err(end) = cx.emit(child.clone(), depth).await {
                        return end;
                    }
                }
                if cx.should_expand(depth) && child.is_expandable() {
                    // Warm upcoming siblings while this subtree drains
                    for sibling in &lookahead {
                        prefetch.schedule(cx, sibling, depth);
                    }
                    let result = prefetch.claim(cx, child.clone(), depth).await;
                    cx.stats.record_expanded();
                    match result {
                        Ok(children) => {
                            stack.push(Frame {
                                node: child,
                                depth,
                                children: children.into(),
                            });
                        }
                        Err(error) => {
                            if let Some(end) = cx.fail(child.key(), depth, error).await {
                                return end;
                            }
                            // Descendants are unknown; post-order still
                            // reports the node itself
                            if post_order {
                                if let Err(end) = cx.emit(child, depth).await {
                                    return end;
                                }
                            }
                        }
                    }
                } else if post_order {
                    if let Err(end) = cx.emit(child, depth).await {
                        return end;
                    }
                }
            }
        }
    }
    DriveEnd::Finished
}
