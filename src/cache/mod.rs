//! Completeness-aware cache adapter
//!
//! Decorates any adapter with an in-memory cache that records how
//! deeply each node has been scanned, plus single-flight coordination
//! so concurrent requests for the same node share one underlying scan.
//!
//! ```text
//!                    children(node, required_depth)
//!                               │
//!                     ┌─────────▼──────────┐
//!                     │  CompletenessTable │  hit: depth_scanned ≥ required
//!                     │  CacheKey → Entry  │──────────────▶ cached children
//!                     └─────────┬──────────┘
//!                               │ miss / upgrade
//!                     ┌─────────▼──────────┐
//!                     │   InFlightTable    │  occupied: await shared result
//!                     │  CacheKey → watch  │──────────────▶ re-check table
//!                     └─────────┬──────────┘
//!                               │ vacant: register, scan inner adapter
//!                               ▼
//!                   publish entry, wake all waiters
//! ```
//!
//! Two modes, fixed at construction and monomorphized so the hit path
//! never branches on mode:
//! - **Safe**: LRU-ordered table bounded by `max_entries`; hits move the
//!   entry to MRU; inserts evict from the LRU end.
//! - **Fast**: plain hash map, no eviction, no ordering bookkeeping.
//!
//! The two tables and the counters share one short-lived mutex. No
//! adapter I/O happens under the lock; waiters hold only a cloned watch
//! receiver while parked.

mod entry;
mod store;
mod tracker;

pub use entry::{CacheEntry, CacheKey, ValidatorToken};
pub use store::{CacheStore, FastStore, LruStore};

use crate::adapter::{config_digest, AdapterId, ChildRequest, Depth, TreeAdapter};
use crate::error::{AdapterError, AdapterResult, ConfigError, ConfigResult};
use crate::node::{NodeHandle, NodeKey};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;
use tracker::NodeTracker;

/// Callback producing a source-level change token for revalidation.
///
/// Tokens are compared for equality only. Returning `None` means no
/// token could be obtained; the cached entry is then trusted as-is.
#[async_trait]
pub trait ChangeValidator: Send + Sync {
    async fn current_token(&self, node: &NodeHandle) -> Option<ValidatorToken>;
}

/// Configuration for the cache adapter
#[derive(Clone)]
pub struct CacheConfig {
    /// Safe-mode bound on the completeness table; LRU eviction beyond it
    pub max_entries: usize,
    /// Safe-mode bound on auxiliary per-node completeness records
    pub max_tracked_nodes: usize,
    /// How long a cached entry is served without revalidation
    pub validation_ttl: Duration,
    /// Optional change-token source consulted after the TTL expires
    pub validator: Option<Arc<dyn ChangeValidator>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_entries: 10_000,
            max_tracked_nodes: 10_000,
            validation_ttl: Duration::from_secs(5),
            validator: None,
        }
    }
}

impl CacheConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the completeness-table bound (safe mode only)
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the per-node record bound (safe mode only)
    pub fn with_max_tracked_nodes(mut self, max_tracked_nodes: usize) -> Self {
        self.max_tracked_nodes = max_tracked_nodes;
        self
    }

    /// Set how long entries are served without revalidation
    pub fn with_validation_ttl(mut self, validation_ttl: Duration) -> Self {
        self.validation_ttl = validation_ttl;
        self
    }

    /// Set the change-token source
    pub fn with_validator(mut self, validator: Arc<dyn ChangeValidator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("max_entries", &self.max_entries)
            .field("max_tracked_nodes", &self.max_tracked_nodes)
            .field("validation_ttl", &self.validation_ttl)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Snapshot of the advisory cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    pub evictions: u64,
    pub upgrades: u64,
    pub coalesced_waits: u64,
    pub entries: usize,
    pub tracked_nodes: usize,
}

/// Monotone counters; eventually consistent under concurrency and never
/// load-bearing for correctness. Failed scans bump none of hits/misses.
#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    evictions: AtomicU64,
    upgrades: AtomicU64,
    coalesced_waits: AtomicU64,
}

impl CacheCounters {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    fn record_upgrade(&self) {
        self.upgrades.fetch_add(1, Ordering::Relaxed);
    }

    fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome broadcast to coalesced waiters: `None` until the scan
/// finishes, then the shared success/failure.
type ScanOutcome = Option<Result<(), AdapterError>>;

/// Both tables behind one short-lived lock
struct Tables<S: CacheStore> {
    entries: S,
    in_flight: HashMap<CacheKey, watch::Sender<ScanOutcome>>,
    tracker: NodeTracker,
}

/// What the locked lookup decided
enum Decision {
    /// Served from cache
    Hit(Vec<NodeHandle>),
    /// Entry exists but its TTL expired and a validator is configured
    Revalidate {
        stored: Option<ValidatorToken>,
        inserted_at: Instant,
    },
    /// Another caller is scanning this key; await its outcome
    Wait(watch::Receiver<ScanOutcome>),
    /// We registered the in-flight record and must scan
    Scan,
}

/// Revalidation verdict after fetching a fresh token
enum Reval {
    Hit(Vec<NodeHandle>),
    Retry,
    Wait(watch::Receiver<ScanOutcome>),
    Scan,
}

/// Removes the in-flight record if the scan never published, waking
/// waiters with a closed channel so they retry from the lookup.
struct InFlightGuard<'a, S: CacheStore> {
    cache: &'a CacheAdapter<S>,
    key: CacheKey,
    armed: bool,
}

impl<S: CacheStore> Drop for InFlightGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            let mut tables = self.cache.tables.lock();
            tables.in_flight.remove(&self.key);
        }
    }
}

/// Decorator adding a completeness-aware cache with single-flight
/// coordination to any adapter.
///
/// Construct with [`CacheAdapter::safe`] (LRU-bounded) or
/// [`CacheAdapter::fast`] (unbounded, zero eviction overhead). The mode
/// is part of the type; there is no runtime switch.
pub struct CacheAdapter<S: CacheStore> {
    inner: Arc<dyn TreeAdapter>,
    id: AdapterId,
    scope: u64,
    validation_ttl: Duration,
    validator: Option<Arc<dyn ChangeValidator>>,
    tables: Mutex<Tables<S>>,
    counters: CacheCounters,
}

impl CacheAdapter<LruStore> {
    /// Safe mode: completeness table bounded by `max_entries` with LRU
    /// eviction; per-node records bounded by `max_tracked_nodes`.
    pub fn safe(inner: Arc<dyn TreeAdapter>, config: CacheConfig) -> ConfigResult<Self> {
        let max_entries = NonZeroUsize::new(config.max_entries).ok_or(
            ConfigError::InvalidCacheCapacity {
                entries: config.max_entries,
            },
        )?;
        let max_tracked = NonZeroUsize::new(config.max_tracked_nodes).ok_or(
            ConfigError::InvalidTrackedNodes {
                limit: config.max_tracked_nodes,
            },
        )?;
        Ok(Self::build(
            inner,
            config,
            "cache-safe",
            LruStore::new(max_entries),
            NodeTracker::bounded(max_tracked),
        ))
    }
}

impl CacheAdapter<FastStore> {
    /// Fast mode: unordered table, no eviction, no size enforcement,
    /// no LRU bookkeeping. `max_entries`/`max_tracked_nodes` are ignored.
    pub fn fast(inner: Arc<dyn TreeAdapter>, config: CacheConfig) -> Self {
        Self::build(
            inner,
            config,
            "cache-fast",
            FastStore::new(),
            NodeTracker::unbounded(),
        )
    }
}

impl<S: CacheStore> CacheAdapter<S> {
    fn build(
        inner: Arc<dyn TreeAdapter>,
        config: CacheConfig,
        kind: &str,
        entries: S,
        tracker: NodeTracker,
    ) -> Self {
        let id = AdapterId::derived(
            kind,
            &inner.identity(),
            &format!(
                "max_entries={},ttl={:?}",
                config.max_entries, config.validation_ttl
            ),
        );
        // Scope tag derived from the full identity chain: stacks over
        // the same base, and independent caches over the same base, all
        // land in disjoint key spaces.
        let scope = config_digest(id.as_str());
        CacheAdapter {
            inner,
            id,
            scope,
            validation_ttl: config.validation_ttl,
            validator: config.validator,
            tables: Mutex::new(Tables {
                entries,
                in_flight: HashMap::new(),
                tracker,
            }),
            counters: CacheCounters::default(),
        }
    }

    /// Snapshot of counters and table sizes
    pub fn stats(&self) -> CacheStats {
        let tables = self.tables.lock();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            upgrades: self.counters.upgrades.load(Ordering::Relaxed),
            coalesced_waits: self.counters.coalesced_waits.load(Ordering::Relaxed),
            entries: tables.entries.len(),
            tracked_nodes: tables.tracker.len(),
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.tables.lock().entries.len()
    }

    /// True when no entries are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scans currently in flight
    pub fn in_flight_scans(&self) -> usize {
        self.tables.lock().in_flight.len()
    }

    /// Deepest scan recorded for a node, if it is still tracked
    pub fn scanned_depth(&self, key: &NodeKey) -> Option<Depth> {
        self.tables.lock().tracker.scan_depth(key)
    }

    /// Whether a node was ever scanned (and is still tracked)
    pub fn was_scanned(&self, key: &NodeKey) -> bool {
        self.scanned_depth(key).is_some()
    }

    /// Drop the cached entry for a node. Returns true when an entry was
    /// present. In-flight scans are unaffected; their publish simply
    /// repopulates the table.
    pub fn invalidate(&self, key: &NodeKey) -> bool {
        let cache_key = CacheKey::new(key.clone(), self.scope);
        self.tables.lock().entries.remove(&cache_key)
    }

    /// Drop all cached entries and per-node records. Counters keep
    /// their values for post-hoc analysis.
    pub fn clear(&self) {
        let mut tables = self.tables.lock();
        tables.entries.clear();
        tables.tracker.clear();
    }

    async fn children_cached(
        &self,
        node: &NodeHandle,
        required: Depth,
    ) -> AdapterResult<Vec<NodeHandle>> {
        let key = CacheKey::new(node.key(), self.scope);
        loop {
            let decision = {
                let mut tables = self.tables.lock();
                self.decide(&mut tables, &key, required)
            };
            match decision {
                Decision::Hit(children) => return Ok(children),
                Decision::Wait(receiver) => match self.await_outcome(receiver).await {
                    Some(Err(error)) => return Err(error),
                    // Success or a vanished scanner: re-evaluate the table
                    _ => continue,
                },
                Decision::Revalidate {
                    stored,
                    inserted_at,
                } => match self.revalidate(node, &key, required, stored, inserted_at).await {
                    Reval::Hit(children) => return Ok(children),
                    Reval::Retry => continue,
                    Reval::Wait(receiver) => match self.await_outcome(receiver).await {
                        Some(Err(error)) => return Err(error),
                        _ => continue,
                    },
                    Reval::Scan => return self.scan_and_publish(node, &key, required).await,
                },
                Decision::Scan => return self.scan_and_publish(node, &key, required).await,
            }
        }
    }

    fn decide(&self, tables: &mut Tables<S>, key: &CacheKey, required: Depth) -> Decision {
        enum Peeked {
            Absent,
            Hit(Vec<NodeHandle>),
            Insufficient,
            Revalidate {
                stored: Option<ValidatorToken>,
                inserted_at: Instant,
            },
        }

        let peeked = match tables.entries.peek(key) {
            None => Peeked::Absent,
            Some(entry) => {
                if entry.age() >= self.validation_ttl && self.validator.is_some() {
                    Peeked::Revalidate {
                        stored: entry.validator,
                        inserted_at: entry.inserted_at,
                    }
                } else if entry.satisfies(required) {
                    Peeked::Hit(entry.children.clone())
                } else {
                    Peeked::Insufficient
                }
            }
        };

        match peeked {
            Peeked::Hit(children) => {
                // Move to MRU in safe mode; no-op in fast mode
                let _ = tables.entries.get(key);
                self.counters.record_hit();
                Decision::Hit(children)
            }
            Peeked::Revalidate {
                stored,
                inserted_at,
            } => Decision::Revalidate {
                stored,
                inserted_at,
            },
            Peeked::Insufficient => {
                self.counters.record_upgrade();
                self.join_or_register(tables, key)
            }
            Peeked::Absent => self.join_or_register(tables, key),
        }
    }

    fn join_or_register(&self, tables: &mut Tables<S>, key: &CacheKey) -> Decision {
        if let Some(sender) = tables.in_flight.get(key) {
            self.counters.record_coalesced_wait();
            return Decision::Wait(sender.subscribe());
        }
        let (sender, _receiver) = watch::channel(None);
        tables.in_flight.insert(key.clone(), sender);
        Decision::Scan
    }

    /// Fetch a fresh token and re-judge the expired entry.
    ///
    /// The entry is identified by its `inserted_at` stamp; if it was
    /// replaced or removed while the token was being fetched, the whole
    /// lookup restarts.
    async fn revalidate(
        &self,
        node: &NodeHandle,
        key: &CacheKey,
        required: Depth,
        stored: Option<ValidatorToken>,
        inserted_at: Instant,
    ) -> Reval {
        let Some(validator) = self.validator.as_ref() else {
            return Reval::Retry;
        };
        let current = validator.current_token(node).await;

        enum Verdict {
            Hit(Vec<NodeHandle>),
            Insufficient,
            Stale,
        }

        let mut tables = self.tables.lock();
        let verdict = match tables.entries.peek(key) {
            Some(entry) if entry.inserted_at == inserted_at => {
                // No obtainable token: trust the entry as-is
                let fresh = current.is_none() || current == stored;
                if !fresh {
                    Verdict::Stale
                } else if entry.satisfies(required) {
                    Verdict::Hit(entry.children.clone())
                } else {
                    Verdict::Insufficient
                }
            }
            _ => return Reval::Retry,
        };

        match verdict {
            Verdict::Hit(children) => {
                let _ = tables.entries.get(key);
                self.counters.record_hit();
                Reval::Hit(children)
            }
            Verdict::Insufficient => {
                self.counters.record_upgrade();
                match self.join_or_register(&mut tables, key) {
                    Decision::Wait(receiver) => Reval::Wait(receiver),
                    _ => Reval::Scan,
                }
            }
            Verdict::Stale => {
                debug!(key = %key, "validator token changed; discarding entry");
                // Present → Absent before the Scanning transition; a
                // staleness removal is not an eviction
                tables.entries.remove(key);
                match self.join_or_register(&mut tables, key) {
                    Decision::Wait(receiver) => Reval::Wait(receiver),
                    _ => Reval::Scan,
                }
            }
        }
    }

    /// Run the inner scan and publish the result.
    ///
    /// The validator token is captured *before* the scan: a concurrent
    /// source change during the scan leaves a pre-change token in the
    /// entry, so the next revalidation misses and rescans.
    ///
    /// Publish order matters: the entry is inserted, then the in-flight
    /// record is removed and its waiters woken, all under one lock, so a
    /// waiter that re-checks always finds the entry. Failed scans
    /// publish nothing; every waiter receives the same error.
    async fn scan_and_publish(
        &self,
        node: &NodeHandle,
        key: &CacheKey,
        required: Depth,
    ) -> AdapterResult<Vec<NodeHandle>> {
        let mut guard = InFlightGuard {
            cache: self,
            key: key.clone(),
            armed: true,
        };
        let token = match self.validator.as_ref() {
            Some(validator) => validator.current_token(node).await,
            None => None,
        };
        let result = self
            .inner
            .children(node, ChildRequest::with_depth(required))
            .await;

        let mut tables = self.tables.lock();
        match result {
            Ok(children) => {
                let entry = CacheEntry::new(children.clone(), required, token);
                let evicted = tables.entries.insert(key.clone(), entry);
                if evicted > 0 {
                    self.counters.record_evictions(evicted as u64);
                }
                tables.tracker.record(&key.node, required);
                self.counters.record_miss();
                if let Some(sender) = tables.in_flight.remove(key) {
                    let _ = sender.send(Some(Ok(())));
                }
                guard.armed = false;
                Ok(children)
            }
            Err(error) => {
                debug!(key = %key, error = %error, "scan failed; waking waiters with the error");
                if let Some(sender) = tables.in_flight.remove(key) {
                    let _ = sender.send(Some(Err(error.clone())));
                }
                guard.armed = false;
                Err(error)
            }
        }
    }

    /// Park on a shared in-flight result.
    ///
    /// Returns `None` when the scanning caller vanished without
    /// publishing (its future was dropped); the caller then retries
    /// from the lookup.
    async fn await_outcome(&self, mut receiver: watch::Receiver<ScanOutcome>) -> ScanOutcome {
        loop {
            let current = receiver.borrow_and_update().clone();
            if let Some(outcome) = current {
                return Some(outcome);
            }
            if receiver.changed().await.is_err() {
                return None;
            }
        }
    }
}

#[async_trait]
impl<S: CacheStore> TreeAdapter for CacheAdapter<S> {
    async fn children(&self, node: &NodeHandle, req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        if !req.use_cache {
            self.counters.record_bypass();
            return self.inner.children(node, req).await;
        }
        self.children_cached(node, req.required_depth).await
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

    fn json_stack() -> (Arc<JsonAdapter>, NodeHandle) {
        let adapter = Arc::new(JsonAdapter::new(json!({
            "a": {"x": 1},
            "b": [1, 2],
            "c": "leaf",
        })));
        let root = adapter.root_node();
        (adapter, root)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (inner, root) = json_stack();
        let cache = CacheAdapter::safe(inner, CacheConfig::new()).unwrap();

        let first = cache.children(&root, ChildRequest::default()).await.unwrap();
        let second = cache.children(&root, ChildRequest::default()).await.unwrap();

        let first_keys: Vec<_> = first.iter().map(|child| child.key()).collect();
        let second_keys: Vec<_> = second.iter().map(|child| child.key()).collect();
        assert_eq!(first_keys, second_keys);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
        assert!(cache.was_scanned(&root.key()));
    }

    #[tokio::test]
    async fn test_bypass_touches_nothing() {
        let (inner, root) = json_stack();
        let cache = CacheAdapter::safe(inner, CacheConfig::new()).unwrap();

        cache
            .children(&root, ChildRequest::default().bypass_cache())
            .await
            .unwrap();

        let stats = cache.stats();
        assert_eq!(stats.bypasses, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entries, 0);
        assert!(!cache.was_scanned(&root.key()));
    }

    #[tokio::test]
    async fn test_depth_upgrade_rescans() {
        let (inner, root) = json_stack();
        let cache = CacheAdapter::safe(inner, CacheConfig::new()).unwrap();

        cache.children(&root, ChildRequest::default()).await.unwrap();
        // A deeper requirement cannot be served by the depth-0 entry
        cache
            .children(&root, ChildRequest::with_depth(Depth::Levels(1)))
            .await
            .unwrap();

        let stats = cache.stats();
        assert_eq!(stats.upgrades, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(
            cache.scanned_depth(&root.key()),
            Some(Depth::Levels(1)),
            "tracker keeps the deepest scan"
        );

        // The upgraded entry now serves both depths
        cache.children(&root, ChildRequest::default()).await.unwrap();
        cache
            .children(&root, ChildRequest::with_depth(Depth::Levels(1)))
            .await
            .unwrap();
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_miss() {
        let (inner, root) = json_stack();
        let cache = CacheAdapter::safe(inner, CacheConfig::new()).unwrap();

        cache.children(&root, ChildRequest::default()).await.unwrap();
        assert!(cache.invalidate(&root.key()));
        assert!(!cache.invalidate(&root.key()));

        cache.children(&root, ChildRequest::default()).await.unwrap();
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_config_error() {
        let (inner, _root) = json_stack();
        let err = match CacheAdapter::safe(inner, CacheConfig::new().with_max_entries(0)) {
            Err(err) => err,
            Ok(_) => panic!("expected a config error"),
        };
        assert!(matches!(err, ConfigError::InvalidCacheCapacity { .. }));
    }

    #[tokio::test]
    async fn test_clear_keeps_counters() {
        let (inner, root) = json_stack();
        let cache = CacheAdapter::fast(inner, CacheConfig::new());

        cache.children(&root, ChildRequest::default()).await.unwrap();
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.misses, 1);
    }
}
