//! Error types for arborwalk
//!
//! This module defines the error hierarchy covering:
//! - Adapter errors (per-node source failures during child enumeration)
//! - Configuration errors (invalid parameters at construction)
//! - Traversal errors (cancellation, channel failures, broken invariants)
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Adapter errors are per-node and `Clone` so that coalesced cache
//!   waiters can all receive the same failure
//! - Preserve error chains for debugging

use crate::node::NodeKey;
use thiserror::Error;

/// Per-node errors raised by adapters during child enumeration.
///
/// These errors never abort a traversal by themselves; the engine's
/// error policy decides whether to skip the subtree or fail fast.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The source could not be read (permission, transport, I/O)
    #[error("source unavailable for '{key}': {reason}")]
    SourceUnavailable { key: NodeKey, reason: String },

    /// The node disappeared between discovery and enumeration
    #[error("node '{key}' no longer exists")]
    NodeGone { key: NodeKey },
}

impl AdapterError {
    /// Build a `SourceUnavailable` error from any displayable cause
    pub fn unavailable(key: NodeKey, cause: impl std::fmt::Display) -> Self {
        AdapterError::SourceUnavailable {
            key,
            reason: cause.to_string(),
        }
    }

    /// The node key this error is about
    pub fn key(&self) -> &NodeKey {
        match self {
            AdapterError::SourceUnavailable { key, .. } => key,
            AdapterError::NodeGone { key } => key,
        }
    }

    /// Check if retrying the same call could succeed
    ///
    /// `SourceUnavailable` is transient (permissions change, transports
    /// recover); `NodeGone` is permanent for that node.
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::SourceUnavailable { .. })
    }
}

/// Configuration errors raised at construction time
///
/// An adapter or traversal that fails construction is never usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid dispatch batch size
    #[error("invalid batch size {size}: must be at least 1")]
    InvalidBatchSize { size: usize },

    /// Invalid concurrency limit
    #[error("invalid concurrency limit {limit}: must be at least 1")]
    InvalidConcurrency { limit: usize },

    /// Invalid cache capacity
    #[error("invalid cache capacity {entries}: must be at least 1 in safe mode")]
    InvalidCacheCapacity { entries: usize },

    /// Invalid tracked-node limit
    #[error("invalid tracked-node limit {limit}: must be at least 1 in safe mode")]
    InvalidTrackedNodes { limit: usize },
}

/// Top-level error type for traversals
#[derive(Error, Debug)]
pub enum WalkError {
    /// Per-node adapter failure surfaced under the fail-fast policy
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The traversal was cancelled cooperatively
    #[error("traversal cancelled")]
    Cancelled,

    /// Invalid parameters at construction
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Output channel closed unexpectedly
    #[error("output channel closed unexpectedly")]
    ChannelClosed,

    /// A state that should be unreachable was reached; indicates a bug
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

/// Result type alias for WalkError
pub type Result<T> = std::result::Result<T, WalkError>;

/// Result type alias for AdapterError
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Result type alias for ConfigError
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_transient() {
        let unavailable = AdapterError::unavailable(NodeKey::from("/data"), "permission denied");
        assert!(unavailable.is_transient());

        let gone = AdapterError::NodeGone {
            key: NodeKey::from("/data/missing"),
        };
        assert!(!gone.is_transient());
    }

    #[test]
    fn test_adapter_error_key() {
        let err = AdapterError::NodeGone {
            key: NodeKey::from("/a/b"),
        };
        assert_eq!(err.key().as_str(), "/a/b");
    }

    #[test]
    fn test_error_conversion() {
        let adapter_err = AdapterError::NodeGone {
            key: NodeKey::from("/missing"),
        };
        let walk_err: WalkError = adapter_err.into();
        assert!(matches!(walk_err, WalkError::Adapter(_)));

        let config_err = ConfigError::InvalidBatchSize { size: 0 };
        let walk_err: WalkError = config_err.into();
        assert!(matches!(walk_err, WalkError::Config(_)));
    }
}
