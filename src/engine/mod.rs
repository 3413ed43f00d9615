//! Strategy-parameterized concurrent traversal engine
//!
//! Walks any [`TreeAdapter`] from a root node, yielding `(node, depth)`
//! pairs in strategy order on a single logical stream while child
//! enumeration runs concurrently underneath, bounded by a semaphore.
//!
//! ```text
//!  traverse(root, adapter, options)
//!         │
//!         ▼                      ┌──────────────────────────────┐
//!  ┌─────────────┐   dispatch   │  adapter.children() calls     │
//!  │ driver task │─────────────▶│  ≤ max_concurrent in flight   │
//!  │  (frontier) │◀─────────────│  batch_size per wave          │
//!  └──────┬──────┘   ordered    └──────────────────────────────┘
//!         │ bounded mpsc (backpressure)
//!         ▼
//!     Traversal::next() → (node, depth)
//! ```
//!
//! Out-of-order completions are buffered until all earlier dispatches
//! have emitted, so the output order is exactly the strategy order no
//! matter how enumeration interleaves.

mod bfs;
mod dfs;
mod stats;

pub use stats::{NodeFailure, WalkReport, WalkStats, WalkStatsSnapshot};

use crate::adapter::{ChildRequest, Depth, TreeAdapter};
use crate::error::{AdapterError, ConfigError, ConfigResult, Result, WalkError};
use crate::node::{NodeHandle, NodeKey};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default number of frontier nodes dispatched per wave
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Default bound on simultaneous adapter calls
pub const DEFAULT_MAX_CONCURRENT: usize = 100;

/// Order in which nodes are yielded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Level order: non-decreasing depth, children grouped by parent
    #[default]
    Bfs,
    /// Parent before any of its descendants
    DfsPre,
    /// Every descendant before the node itself
    DfsPost,
}

/// What to do when an adapter fails on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// First per-node error aborts the traversal with that error
    FailFast,
    /// Report, skip the subtree, keep walking
    #[default]
    ContinueOnErrors,
    /// As above, but failures are also accumulated into the report
    CollectErrors,
}

/// Sink for per-node errors under the continue/collect policies
pub trait ErrorReporter: Send + Sync {
    fn report(&self, key: &NodeKey, depth: u32, error: &AdapterError);
}

/// Default reporter: structured warning per skipped subtree
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, key: &NodeKey, depth: u32, error: &AdapterError) {
        warn!(key = %key, depth, error = %error, "skipping subtree after adapter error");
    }
}

/// Traversal parameters
#[derive(Clone)]
pub struct WalkOptions {
    pub strategy: Strategy,
    /// Nodes at this depth are emitted but never expanded; `None` walks
    /// the whole tree
    pub max_depth: Option<u32>,
    /// Frontier nodes dispatched per wave
    pub batch_size: usize,
    /// Bound on simultaneous adapter calls
    pub max_concurrent: usize,
    pub error_policy: ErrorPolicy,
    pub reporter: Arc<dyn ErrorReporter>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            strategy: Strategy::Bfs,
            max_depth: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            error_policy: ErrorPolicy::ContinueOnErrors,
            reporter: Arc::new(TracingReporter),
        }
    }
}

impl WalkOptions {
    /// Default options: BFS, unlimited depth, continue on errors
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
            });
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency {
                limit: self.max_concurrent,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkOptions")
            .field("strategy", &self.strategy)
            .field("max_depth", &self.max_depth)
            .field("batch_size", &self.batch_size)
            .field("max_concurrent", &self.max_concurrent)
            .field("error_policy", &self.error_policy)
            .finish()
    }
}

/// Why a driver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriveEnd {
    /// Frontier and in-flight work drained
    Finished,
    /// Cancellation signal observed
    Cancelled,
    /// The consumer dropped the traversal stream
    ConsumerGone,
    /// Fail-fast policy surfaced an error
    Failed,
}

/// Everything a strategy driver needs
pub(crate) struct WalkContext {
    pub(crate) adapter: Arc<dyn TreeAdapter>,
    pub(crate) tx: mpsc::Sender<Result<(NodeHandle, u32)>>,
    pub(crate) cancel_rx: watch::Receiver<bool>,
    pub(crate) stats: Arc<WalkStats>,
    pub(crate) semaphore: Arc<Semaphore>,
    pub(crate) max_depth: Option<u32>,
    pub(crate) batch_size: usize,
    pub(crate) error_policy: ErrorPolicy,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    pub(crate) failures: Vec<NodeFailure>,
}

/// A dispatched child-enumeration task: the parent handle plus the
/// outcome of enumerating its children
pub(crate) type FetchFuture = BoxFuture<'static, (NodeHandle, crate::error::AdapterResult<Vec<NodeHandle>>)>;

impl WalkContext {
    pub(crate) fn cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Whether children of a node at `depth` should be requested
    pub(crate) fn should_expand(&self, depth: u32) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }

    /// Completeness hint for a scan whose children land at `child_depth`
    pub(crate) fn depth_hint(&self, child_depth: u32) -> Depth {
        match self.max_depth {
            None => Depth::Complete,
            Some(max) => Depth::Levels(max.saturating_sub(child_depth)),
        }
    }

    /// Build a bounded concurrent child-enumeration task
    pub(crate) fn fetch(&self, node: NodeHandle, child_depth: u32) -> FetchFuture {
        let adapter = Arc::clone(&self.adapter);
        let semaphore = Arc::clone(&self.semaphore);
        let req = ChildRequest::with_depth(self.depth_hint(child_depth));
        Box::pin(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let result = adapter.children(&node, req).await;
            (node, result)
        })
    }

    /// Yield one `(node, depth)` pair, applying output backpressure.
    ///
    /// Returns the reason to stop when the consumer is gone or the
    /// cancellation signal fires while the channel is full.
    pub(crate) async fn emit(&mut self, node: NodeHandle, depth: u32) -> std::result::Result<(), DriveEnd> {
        if self.cancelled() {
            return Err(DriveEnd::Cancelled);
        }
        tokio::select! {
            sent = self.tx.send(Ok((node, depth))) => {
                if sent.is_err() {
                    return Err(DriveEnd::ConsumerGone);
                }
                self.stats.record_emitted();
                Ok(())
            }
            _ = self.cancel_rx.changed() => Err(DriveEnd::Cancelled),
        }
    }

    /// Handle a per-node enumeration failure according to policy.
    ///
    /// Returns `Some(end)` when the traversal must stop.
    pub(crate) async fn fail(
        &mut self,
        key: NodeKey,
        depth: u32,
        error: AdapterError,
    ) -> Option<DriveEnd> {
        self.stats.record_error();
        match self.error_policy {
            ErrorPolicy::FailFast => {
                let _ = self.tx.send(Err(WalkError::Adapter(error))).await;
                Some(DriveEnd::Failed)
            }
            ErrorPolicy::ContinueOnErrors => {
                self.reporter.report(&key, depth, &error);
                self.stats.record_skipped();
                None
            }
            ErrorPolicy::CollectErrors => {
                self.reporter.report(&key, depth, &error);
                self.stats.record_skipped();
                self.failures.push(NodeFailure { key, depth, error });
                None
            }
        }
    }
}

/// Handle to a running traversal.
///
/// One logical output stream: call [`Traversal::next`] until it returns
/// `None`, then [`Traversal::finish`] for the summary. Dropping the
/// handle stops the walk.
pub struct Traversal {
    rx: mpsc::Receiver<Result<(NodeHandle, u32)>>,
    cancel_tx: watch::Sender<bool>,
    stats: Arc<WalkStats>,
    driver: JoinHandle<WalkReport>,
}

impl Traversal {
    /// Next node in strategy order, or `None` when the walk is over.
    ///
    /// An `Err` item is terminal: fail-fast surfaced an adapter error.
    pub async fn next(&mut self) -> Option<Result<(NodeHandle, u32)>> {
        self.rx.recv().await
    }

    /// Request cooperative cancellation.
    ///
    /// The engine stops scheduling adapter calls, abandons in-flight
    /// work, and terminates the stream within a bounded number of
    /// completions. Already-emitted nodes and cache entries populated
    /// along the way remain valid.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Live counter snapshot
    pub fn stats(&self) -> WalkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop consuming and collect the end-of-walk report.
    ///
    /// Any nodes not yet consumed are discarded; a walk still running
    /// is terminated as if the consumer went away.
    pub async fn finish(mut self) -> Result<WalkReport> {
        self.rx.close();
        while self.rx.recv().await.is_some() {}
        self.driver
            .await
            .map_err(|_| WalkError::Invariant("walk driver panicked".into()))
    }

    /// Drain the whole walk into a vector
    pub async fn collect(mut self) -> Result<Vec<(NodeHandle, u32)>> {
        let mut nodes = Vec::new();
        while let Some(item) = self.next().await {
            nodes.push(item?);
        }
        self.finish().await?;
        Ok(nodes)
    }
}

/// Start a traversal of `root` over `adapter`.
///
/// Validates the options, spawns the driver task, and returns the
/// stream handle. Defaults: BFS, unlimited depth, `batch_size = 256`,
/// `max_concurrent = 100`, continue-on-errors.
pub fn traverse(
    root: NodeHandle,
    adapter: Arc<dyn TreeAdapter>,
    options: WalkOptions,
) -> ConfigResult<Traversal> {
    options.validate()?;

    let (tx, rx) = mpsc::channel(options.batch_size);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let stats = Arc::new(WalkStats::default());

    let cx = WalkContext {
        adapter,
        tx,
        cancel_rx,
        stats: Arc::clone(&stats),
        semaphore: Arc::new(Semaphore::new(options.max_concurrent)),
        max_depth: options.max_depth,
        batch_size: options.batch_size,
        error_policy: options.error_policy,
        reporter: Arc::clone(&options.reporter),
        failures: Vec::new(),
    };
    let strategy = options.strategy;
    let driver = tokio::spawn(drive(cx, root, strategy));

    Ok(Traversal {
        rx,
        cancel_tx,
        stats,
        driver,
    })
}

async fn drive(mut cx: WalkContext, root: NodeHandle, strategy: Strategy) -> WalkReport {
    let started = Instant::now();
    info!(
        strategy = ?strategy,
        max_depth = ?cx.max_depth,
        batch_size = cx.batch_size,
        "starting traversal"
    );

    let end = match strategy {
        Strategy::Bfs => bfs::run(&mut cx, root).await,
        Strategy::DfsPre => dfs::run(&mut cx, root, false).await,
        Strategy::DfsPost => dfs::run(&mut cx, root, true).await,
    };

    let snapshot = cx.stats.snapshot();
    let report = WalkReport {
        nodes_emitted: snapshot.nodes_emitted,
        nodes_expanded: snapshot.nodes_expanded,
        errors: snapshot.errors,
        failures: std::mem::take(&mut cx.failures),
        duration: started.elapsed(),
        completed: end == DriveEnd::Finished,
    };
    info!(
        emitted = report.nodes_emitted,
        expanded = report.nodes_expanded,
        errors = report.errors,
        duration_ms = report.duration.as_millis() as u64,
        completed = report.completed,
        "traversal finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        assert!(WalkOptions::new().validate().is_ok());
        assert!(matches!(
            WalkOptions::new().with_batch_size(0).validate(),
            Err(ConfigError::InvalidBatchSize { .. })
        ));
        assert!(matches!(
            WalkOptions::new().with_max_concurrent(0).validate(),
            Err(ConfigError::InvalidConcurrency { .. })
        ));
    }

    #[test]
    fn test_depth_hint() {
        let options = WalkOptions::new();
        let (_tx, rx) = watch::channel(false);
        let (out_tx, _out_rx) = mpsc::channel(1);
        let cx = WalkContext {
            adapter: Arc::new(crate::adapter::json::JsonAdapter::new(
                serde_json::json!({}),
            )),
            tx: out_tx,
            cancel_rx: rx,
            stats: Arc::new(WalkStats::default()),
            semaphore: Arc::new(Semaphore::new(1)),
            max_depth: Some(4),
            batch_size: options.batch_size,
            error_policy: options.error_policy,
            reporter: options.reporter,
            failures: Vec::new(),
        };
        assert_eq!(cx.depth_hint(1), Depth::Levels(3));
        assert_eq!(cx.depth_hint(4), Depth::Levels(0));
        assert!(cx.should_expand(3));
        assert!(!cx.should_expand(4));

        let unlimited = WalkContext {
            max_depth: None,
            ..cx
        };
        assert_eq!(unlimited.depth_hint(7), Depth::Complete);
        assert!(unlimited.should_expand(7));
    }
}
