//! Walk statistics and the end-of-walk report

use crate::error::AdapterError;
use crate::node::NodeKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared between the driver and the caller.
///
/// Updated with relaxed atomics; snapshots are advisory and may lag the
/// output stream by a few nodes.
#[derive(Debug, Default)]
pub struct WalkStats {
    pub nodes_emitted: AtomicU64,
    pub nodes_expanded: AtomicU64,
    pub errors: AtomicU64,
    pub subtrees_skipped: AtomicU64,
}

impl WalkStats {
    pub(crate) fn record_emitted(&self) {
        self.nodes_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expanded(&self) {
        self.nodes_expanded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.subtrees_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters at this instant
    pub fn snapshot(&self) -> WalkStatsSnapshot {
        WalkStatsSnapshot {
            nodes_emitted: self.nodes_emitted.load(Ordering::Relaxed),
            nodes_expanded: self.nodes_expanded.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            subtrees_skipped: self.subtrees_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`WalkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStatsSnapshot {
    pub nodes_emitted: u64,
    pub nodes_expanded: u64,
    pub errors: u64,
    pub subtrees_skipped: u64,
}

/// A node whose children could not be enumerated
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub key: NodeKey,
    pub depth: u32,
    pub error: AdapterError,
}

/// Summary of a finished (or cancelled) walk
#[derive(Debug)]
pub struct WalkReport {
    pub nodes_emitted: u64,
    pub nodes_expanded: u64,
    pub errors: u64,
    /// Per-node failures, populated under the collect-errors policy
    pub failures: Vec<NodeFailure>,
    pub duration: Duration,
    /// False when the walk was cancelled, failed fast, or the consumer
    /// went away before the frontier drained
    pub completed: bool,
}
