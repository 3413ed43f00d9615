//! Shared fixtures for integration tests: counting / failing / synthetic
//! adapters and a switchable change validator.

#![allow(dead_code)]

use arborwalk::{
    AdapterError, AdapterId, AdapterResult, ChangeValidator, ChildRequest, NodeHandle, NodeKey,
    TreeAdapter, TreeNode, ValidatorToken,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps an adapter and counts `children` calls, optionally slowing
/// them down so concurrent callers genuinely overlap.
pub struct CountingAdapter {
    inner: Arc<dyn TreeAdapter>,
    total: AtomicU64,
    per_key: Mutex<HashMap<NodeKey, u64>>,
    delay: Option<Duration>,
    id: AdapterId,
}

impl CountingAdapter {
    pub fn new(inner: Arc<dyn TreeAdapter>) -> Self {
        let id = AdapterId::derived("counting", &inner.identity(), "test");
        CountingAdapter {
            inner,
            total: AtomicU64::new(0),
            per_key: Mutex::new(HashMap::new()),
            delay: None,
            id,
        }
    }

    pub fn with_delay(inner: Arc<dyn TreeAdapter>, delay: Duration) -> Self {
        let mut adapter = Self::new(inner);
        adapter.delay = Some(delay);
        adapter
    }

    pub fn total_calls(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, key: &NodeKey) -> u64 {
        self.per_key.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TreeAdapter for CountingAdapter {
    async fn children(&self, node: &NodeHandle, req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.per_key.lock().entry(node.key()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.children(node, req).await
    }

    fn identity(&self) -> AdapterId {
        self.id.clone()
    }
}

/// Wraps an adapter and fails `children` for configured node keys.
pub struct FlakyAdapter {
    inner: Arc<dyn TreeAdapter>,
    // Remaining failures per key; u64::MAX fails forever
    failures: Mutex<HashMap<NodeKey, u64>>,
    delay: Option<Duration>,
    id: AdapterId,
}

impl FlakyAdapter {
    pub fn new(inner: Arc<dyn TreeAdapter>) -> Self {
        let id = AdapterId::derived("flaky", &inner.identity(), "test");
        FlakyAdapter {
            inner,
            failures: Mutex::new(HashMap::new()),
            delay: None,
            id,
        }
    }

    pub fn with_delay(inner: Arc<dyn TreeAdapter>, delay: Duration) -> Self {
        let mut adapter = Self::new(inner);
        adapter.delay = Some(delay);
        adapter
    }

    pub fn fail_always(&self, key: NodeKey) {
        self.failures.lock().insert(key, u64::MAX);
    }

    pub fn fail_times(&self, key: NodeKey, times: u64) {
        self.failures.lock().insert(key, times);
    }
}

#[async_trait]
impl TreeAdapter for FlakyAdapter {
    async fn children(&self, node: &NodeHandle, req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = node.key();
        let should_fail = {
            let mut failures = self.failures.lock();
            match failures.get_mut(&key) {
                Some(0) => {
                    failures.remove(&key);
                    false
                }
                Some(remaining) => {
                    if *remaining != u64::MAX {
                        *remaining -= 1;
                    }
                    true
                }
                None => false,
            }
        };
        if should_fail {
            return Err(AdapterError::SourceUnavailable {
                key,
                reason: "injected failure".to_string(),
            });
        }
        self.inner.children(node, req).await
    }

    fn identity(&self) -> AdapterId {
        self.id.clone()
    }
}

/// Synthetic tree: every node has `width` children down to `levels`
/// levels below the root. All nodes claim to be expandable; nodes at
/// the bottom level simply have no children, which exercises the
/// cache/engine paths for empty scans.
pub struct FanoutAdapter {
    width: usize,
    levels: u32,
    delay: Option<Duration>,
    id: AdapterId,
}

impl FanoutAdapter {
    pub fn new(width: usize, levels: u32) -> Self {
        FanoutAdapter {
            width,
            levels,
            delay: None,
            id: AdapterId::new("fanout", &format!("width={width},levels={levels}")),
        }
    }

    pub fn with_delay(width: usize, levels: u32, delay: Duration) -> Self {
        let mut adapter = Self::new(width, levels);
        adapter.delay = Some(delay);
        adapter
    }

    pub fn root(&self) -> NodeHandle {
        Arc::new(FanoutNode {
            key: NodeKey::from("fan"),
            name: "fan".to_string(),
        })
    }

    fn node_depth(key: &NodeKey) -> u32 {
        key.as_str().matches('.').count() as u32
    }
}

pub struct FanoutNode {
    key: NodeKey,
    name: String,
}

#[async_trait]
impl TreeNode for FanoutNode {
    fn key(&self) -> NodeKey {
        self.key.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TreeAdapter for FanoutAdapter {
    async fn children(&self, node: &NodeHandle, _req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let depth = Self::node_depth(&node.key());
        if depth >= self.levels {
            return Ok(Vec::new());
        }
        let parent = node.key();
        Ok((0..self.width)
            .map(|index| {
                Arc::new(FanoutNode {
                    key: NodeKey::new(format!("{parent}.{index}")),
                    name: index.to_string(),
                }) as NodeHandle
            })
            .collect())
    }

    fn identity(&self) -> AdapterId {
        self.id.clone()
    }
}

/// Change validator whose token is flipped by the test
#[derive(Default)]
pub struct SwitchableValidator {
    token: AtomicU64,
}

impl SwitchableValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: u64) {
        self.token.store(token, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChangeValidator for SwitchableValidator {
    async fn current_token(&self, _node: &NodeHandle) -> Option<ValidatorToken> {
        Some(ValidatorToken::new(self.token.load(Ordering::SeqCst)))
    }
}

/// Install a test subscriber once so `tracing` output shows up with
/// `cargo test -- --nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
