//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{NodeId, NodeSet, Stage, TreeType};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Files directly inside `dir` with the given extension, sorted by path.
    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>>;
}

/// Live allocation state of the game.
///
/// Sampled fresh on every evaluation; implementations must not cache.
pub trait AllocationSource: Send + Sync {
    fn allocated(&self, tree: TreeType) -> NodeSet;
}

/// What the live surface allows for one node right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeAffordance {
    pub allocated: bool,
    pub can_allocate: bool,
    pub can_deallocate: bool,
}

/// Bulk refund surface state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundSurface {
    Closed,
    /// `ready` means a confirm would apply the pending refunds.
    Open { ready: bool },
}

/// Transient surface failure. Never fatal to a convergence run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("node {0} is not on the surface")]
    NodeNotFound(NodeId),

    #[error("refund surface is not open")]
    RefundClosed,

    #[error("nothing is hovered")]
    NothingHovered,

    #[error("hovered element cannot be confirmed: {0}")]
    NotActionable(String),

    #[error("passive panel is closed")]
    Closed,
}

/// UI action surface of the passive panel.
pub trait PassiveSurface: Send + Sync {
    /// Whether the panel for `tree` is visible.
    fn is_open(&self, tree: TreeType) -> bool;

    /// Affordance of node `id`, `None` if it is not on the surface.
    fn node(&self, tree: TreeType, id: NodeId) -> Option<NodeAffordance>;

    /// Node currently under the cursor.
    fn hovered(&self, tree: TreeType) -> Option<NodeId>;

    fn refund_surface(&self, tree: TreeType) -> RefundSurface;

    fn hover_node(&self, tree: TreeType, id: NodeId) -> Result<(), SurfaceError>;

    fn hover_refund(&self, tree: TreeType) -> Result<(), SurfaceError>;

    /// Click whatever is hovered.
    fn confirm(&self, tree: TreeType) -> Result<(), SurfaceError>;
}

/// Read side of build storage.
pub trait StageStore: Send + Sync {
    /// Names of all stored builds, sorted.
    fn list_builds(&self) -> ApplicationResult<Vec<String>>;

    /// Ordered stages of build `name`, all tree types mixed in file order.
    fn load_stages(&self, name: &str) -> ApplicationResult<Vec<Stage>>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(extension)
            {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// On-disk build file layout.
#[derive(Debug, Deserialize)]
struct BuildFile {
    #[serde(default)]
    trees: Vec<Stage>,
}

/// Build files stored as `<dir>/<name>.json`.
pub struct JsonStageStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl JsonStageStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn build_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl StageStore for JsonStageStore {
    fn list_builds(&self) -> ApplicationResult<Vec<String>> {
        if !self.fs.is_dir(&self.dir) {
            debug!("builds dir {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }
        let files = self
            .fs
            .list_files(&self.dir, "json")
            .with_path_context("list builds", &self.dir)?;
        Ok(files
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
            .map(str::to_string)
            .collect())
    }

    fn load_stages(&self, name: &str) -> ApplicationResult<Vec<Stage>> {
        let path = self.build_path(name);
        if !self.fs.is_file(&path) {
            return Err(ApplicationError::BuildNotFound(name.to_string()));
        }
        let content = self
            .fs
            .read_to_string(&path)
            .with_path_context("read build", &path)?;
        let build: BuildFile =
            serde_json::from_str(&content).map_err(|e| ApplicationError::OperationFailed {
                context: format!("parse build {}", path.display()),
                source: Box::new(e),
            })?;
        debug!("loaded build {} with {} stages", name, build.trees.len());
        Ok(build.trees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn given_json_and_other_files_when_listing_then_returns_json_only_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = RealFileSystem.list_files(dir.path(), "json").unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a.json"), dir.path().join("b.json")]
        );
    }

    #[test]
    fn given_missing_builds_dir_when_listing_builds_then_empty() {
        let store = JsonStageStore::new(Arc::new(RealFileSystem), "/nonexistent/builds");
        assert!(store.list_builds().unwrap().is_empty());
    }

    #[test]
    fn given_unknown_build_when_loading_then_build_not_found() {
        let dir = TempDir::new().unwrap();
        let store = JsonStageStore::new(Arc::new(RealFileSystem), dir.path());

        let err = store.load_stages("missing").unwrap_err();

        assert!(matches!(err, ApplicationError::BuildNotFound(name) if name == "missing"));
    }
}
