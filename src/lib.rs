//! arborwalk - Universal Tree Traversal with Completeness-Aware Caching
//!
//! A traversal engine over arbitrary hierarchical sources (filesystems,
//! JSON documents, anything that can enumerate children) with a caching
//! layer that knows how *deeply* each node has been scanned, so repeated
//! exploration is amortized instead of repeated.
//!
//! # Features
//!
//! - **One adapter contract**: base adapters talk to a source, decorator
//!   adapters (filter, cache) wrap other adapters. Everything composes.
//!
//! - **Concurrent engine, ordered output**: child enumeration fans out
//!   up to a concurrency bound while the output stream stays in exact
//!   BFS / DFS-pre / DFS-post order.
//!
//! - **Completeness-aware cache**: entries record scan depth; a deep
//!   scan answers any shallower request. Concurrent requests for the
//!   same node share one underlying scan.
//!
//! - **Bounded memory**: safe mode caps the cache with LRU eviction;
//!   fast mode trades the bound for zero bookkeeping.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Traversal engine (C6)                      │
//! │   frontier → dispatch ≤ max_concurrent → ordered emission       │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ children(node, required_depth)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    CacheAdapter (C5, decorator)                 │
//! │   CompletenessTable + InFlightTable + counters                  │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   FilterAdapter (C4, decorator)                 │
//! │   inclusion predicate, own cache scope                          │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              FsAdapter / JsonAdapter (C3, base)                 │
//! │   batched directory reads / in-memory documents                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use arborwalk::{traverse, CacheAdapter, CacheConfig, FsAdapter, WalkOptions};
//! use std::sync::Arc;
//!
//! let base = Arc::new(FsAdapter::with_defaults());
//! let root = base.root("/var/log").await?;
//! let cached = Arc::new(CacheAdapter::safe(base, CacheConfig::new())?);
//!
//! let mut walk = traverse(root, cached.clone(), WalkOptions::new())?;
//! while let Some(item) = walk.next().await {
//!     let (node, depth) = item?;
//!     println!("{:indent$}{}", "", node.name(), indent = depth as usize * 2);
//! }
//! // Second traversal over the same adapter is served from cache.
//! ```

pub mod adapter;
pub mod cache;
pub mod collect;
pub mod engine;
pub mod error;
pub mod node;

pub use adapter::filesystem::{FsAdapter, FsAdapterConfig, FsNode, FsNodeKind};
pub use adapter::filter::{FilterAdapter, NodePredicate};
pub use adapter::json::{JsonAdapter, JsonNode};
pub use adapter::{AdapterId, ChildRequest, Depth, TreeAdapter};
pub use cache::{
    CacheAdapter, CacheConfig, CacheEntry, CacheStats, CacheStore, ChangeValidator, FastStore,
    LruStore, ValidatorToken,
};
pub use collect::{collect_keys, collect_nodes, count_nodes, find_nodes};
pub use engine::{
    traverse, ErrorPolicy, ErrorReporter, NodeFailure, Strategy, TracingReporter, Traversal,
    WalkOptions, WalkReport, WalkStats, WalkStatsSnapshot,
};
pub use error::{AdapterError, AdapterResult, ConfigError, ConfigResult, Result, WalkError};
pub use node::{NodeHandle, NodeKey, TreeNode};
