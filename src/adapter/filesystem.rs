//! Filesystem base adapter
//!
//! Enumerates directory entries with the platform's batched
//! directory-read primitive (`read_dir`), run on the blocking pool so
//! the async engine never stalls on disk I/O. Entry kinds come from the
//! `DirEntry` file type, avoiding a per-entry stat. Children are
//! reported sorted by file name, giving the deterministic order the
//! traversal contract requires.

use crate::adapter::{AdapterId, ChildRequest, TreeAdapter};
use crate::error::{AdapterError, AdapterResult};
use crate::node::{NodeHandle, NodeKey, TreeNode};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Configuration for the filesystem adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsAdapterConfig {
    /// Follow symbolic links instead of skipping them
    pub follow_symlinks: bool,
    /// Report entries whose name starts with a dot
    pub include_hidden: bool,
}

impl Default for FsAdapterConfig {
    fn default() -> Self {
        FsAdapterConfig {
            follow_symlinks: false,
            include_hidden: true,
        }
    }
}

impl FsAdapterConfig {
    /// Default configuration: skip symlinks, report hidden entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether symbolic links are followed
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set whether hidden entries are reported
    pub fn with_include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }
}

/// Kind of filesystem entry a node refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsNodeKind {
    Directory,
    File,
    Symlink,
    Other,
}

impl FsNodeKind {
    fn from_file_type(file_type: std::fs::FileType) -> Self {
        if file_type.is_dir() {
            FsNodeKind::Directory
        } else if file_type.is_file() {
            FsNodeKind::File
        } else if file_type.is_symlink() {
            FsNodeKind::Symlink
        } else {
            FsNodeKind::Other
        }
    }

    fn label(self) -> &'static str {
        match self {
            FsNodeKind::Directory => "directory",
            FsNodeKind::File => "file",
            FsNodeKind::Symlink => "symlink",
            FsNodeKind::Other => "other",
        }
    }
}

/// A position in the filesystem tree
pub struct FsNode {
    path: PathBuf,
    key: NodeKey,
    name: String,
    kind: FsNodeKind,
}

impl FsNode {
    fn new(path: PathBuf, kind: FsNodeKind) -> Self {
        let key = NodeKey::new(path.to_string_lossy().into_owned());
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        FsNode {
            path,
            key,
            name,
            kind,
        }
    }

    /// Full path of this entry
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry kind as reported at discovery time
    pub fn kind(&self) -> FsNodeKind {
        self.kind
    }
}

#[async_trait]
impl TreeNode for FsNode {
    fn key(&self) -> NodeKey {
        self.key.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_expandable(&self) -> bool {
        self.kind == FsNodeKind::Directory
    }

    async fn metadata(&self) -> Option<Value> {
        let path = self.path.clone();
        let kind = self.kind;
        let meta = tokio::task::spawn_blocking(move || std::fs::symlink_metadata(path))
            .await
            .ok()?
            .ok()?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs());
        Some(json!({
            "kind": kind.label(),
            "size": meta.len(),
            "modified": modified,
            "readonly": meta.permissions().readonly(),
        }))
    }
}

/// Base adapter over a local filesystem
pub struct FsAdapter {
    config: FsAdapterConfig,
    id: AdapterId,
}

impl FsAdapter {
    /// Create an adapter with the given configuration
    pub fn new(config: FsAdapterConfig) -> Self {
        let id = AdapterId::new(
            "fs",
            &format!(
                "follow_symlinks={},include_hidden={}",
                config.follow_symlinks, config.include_hidden
            ),
        );
        FsAdapter { config, id }
    }

    /// Create an adapter with default configuration
    pub fn with_defaults() -> Self {
        Self::new(FsAdapterConfig::default())
    }

    /// Build a root node for a path, verifying it exists.
    ///
    /// Fails with `NodeGone` when the path does not exist and
    /// `SourceUnavailable` when it cannot be inspected.
    pub async fn root(&self, path: impl AsRef<Path>) -> AdapterResult<NodeHandle> {
        let path = path.as_ref().to_path_buf();
        let key = NodeKey::new(path.to_string_lossy().into_owned());
        let stat_path = path.clone();
        let meta = tokio::task::spawn_blocking(move || std::fs::symlink_metadata(stat_path))
            .await
            .map_err(|join| AdapterError::unavailable(key.clone(), join))?
            .map_err(|err| map_io_error(&key, err))?;
        let kind = FsNodeKind::from_file_type(meta.file_type());
        Ok(Arc::new(FsNode::new(path, kind)))
    }
}

fn map_io_error(key: &NodeKey, err: io::Error) -> AdapterError {
    match err.kind() {
        io::ErrorKind::NotFound => AdapterError::NodeGone { key: key.clone() },
        _ => AdapterError::unavailable(key.clone(), err),
    }
}

/// One raw directory entry surviving the configuration filters
struct RawEntry {
    path: PathBuf,
    name: String,
    kind: FsNodeKind,
}

fn scan_directory(path: &Path, config: FsAdapterConfig) -> io::Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !config.include_hidden && name.starts_with('.') {
            continue;
        }
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            // Entry vanished between readdir and type lookup
            Err(_) => continue,
        };
        let kind = if file_type.is_symlink() {
            if !config.follow_symlinks {
                continue;
            }
            match std::fs::metadata(entry.path()) {
                Ok(meta) => FsNodeKind::from_file_type(meta.file_type()),
                // Broken link; report as a plain symlink leaf
                Err(_) => FsNodeKind::Symlink,
            }
        } else {
            FsNodeKind::from_file_type(file_type)
        };
        entries.push(RawEntry {
            path: entry.path(),
            name,
            kind,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[async_trait]
impl TreeAdapter for FsAdapter {
    async fn children(&self, node: &NodeHandle, _req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        if !node.is_expandable() {
            return Ok(Vec::new());
        }
        let key = node.key();
        let path = PathBuf::from(key.as_str());
        let config = self.config;
        let scan_path = path.clone();
        let raw = tokio::task::spawn_blocking(move || scan_directory(&scan_path, config))
            .await
            .map_err(|join| AdapterError::unavailable(key.clone(), join))?
            .map_err(|err| map_io_error(&key, err))?;

        debug!(path = %path.display(), entries = raw.len(), "directory scanned");

        Ok(raw
            .into_iter()
            .map(|entry| Arc::new(FsNode::new(entry.path, entry.kind)) as NodeHandle)
            .collect())
    }

    fn identity(&self) -> AdapterId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join(".hidden"), b"h").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_children_sorted_by_name() {
        let dir = fixture();
        let adapter = FsAdapter::with_defaults();
        let root = adapter.root(dir.path()).await.unwrap();
        let children = adapter
            .children(&root, ChildRequest::default())
            .await
            .unwrap();
        let names: Vec<&str> = children.iter().map(|child| child.name()).collect();
        assert_eq!(names, vec![".hidden", "a.txt", "b.txt", "sub"]);
    }

    #[tokio::test]
    async fn test_hidden_entries_excluded() {
        let dir = fixture();
        let adapter = FsAdapter::new(FsAdapterConfig::new().with_include_hidden(false));
        let root = adapter.root(dir.path()).await.unwrap();
        let children = adapter
            .children(&root, ChildRequest::default())
            .await
            .unwrap();
        assert!(children.iter().all(|child| !child.name().starts_with('.')));
        assert_eq!(children.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_root_is_node_gone() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let adapter = FsAdapter::with_defaults();
        let err = match adapter.root(&missing).await {
            Err(err) => err,
            Ok(_) => panic!("expected a node-gone error"),
        };
        assert!(matches!(err, AdapterError::NodeGone { .. }));
    }

    #[tokio::test]
    async fn test_file_is_leaf() {
        let dir = fixture();
        let adapter = FsAdapter::with_defaults();
        let file = adapter.root(dir.path().join("a.txt")).await.unwrap();
        assert!(!file.is_expandable());
        let children = adapter
            .children(&file, ChildRequest::default())
            .await
            .unwrap();
        assert!(children.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_skipped_by_default() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("link")).unwrap();

        let adapter = FsAdapter::with_defaults();
        let root = adapter.root(dir.path()).await.unwrap();
        let children = adapter
            .children(&root, ChildRequest::default())
            .await
            .unwrap();
        assert!(children.iter().all(|child| child.name() != "link"));

        let following = FsAdapter::new(FsAdapterConfig::new().with_follow_symlinks(true));
        let children = following
            .children(&root, ChildRequest::default())
            .await
            .unwrap();
        assert!(children.iter().any(|child| child.name() == "link"));
    }

    #[tokio::test]
    async fn test_metadata_reports_size() {
        let dir = fixture();
        let adapter = FsAdapter::with_defaults();
        let file = adapter.root(dir.path().join("a.txt")).await.unwrap();
        let meta = file.metadata().await.unwrap();
        assert_eq!(meta["kind"], "file");
        assert_eq!(meta["size"], 1);
    }
}
