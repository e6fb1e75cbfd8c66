//! File identities and their owning language plugin.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Stable identifier of a project file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Identifier of a language plugin (also the protocol language id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(SmolStr);

impl PluginId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct FileInfo {
    id: FileId,
    path: PathBuf,
    plugin: PluginId,
}

/// Shared reference to a file owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    inner: Arc<FileInfo>,
}

impl FileHandle {
    pub fn new(id: FileId, path: impl Into<PathBuf>, plugin: PluginId) -> Self {
        Self {
            inner: Arc::new(FileInfo {
                id,
                path: path.into(),
                plugin,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> FileId {
        self.inner.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    #[must_use]
    pub fn plugin(&self) -> &PluginId {
        &self.inner.plugin
    }

    /// Path relative to `root` with `/` separators, or the full path when the
    /// file lives outside `root`.
    #[must_use]
    pub fn relative_path(&self, root: &Path) -> String {
        let relative = self.inner.path.strip_prefix(root).unwrap_or(&self.inner.path);
        normalize_separators(&relative.to_string_lossy())
    }
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Source of file identities for the analysis pipeline and the debug session.
pub trait FileRegistry: Send + Sync {
    /// Look up a file by id.
    fn file(&self, id: FileId) -> Option<FileHandle>;

    /// Root that protocol paths are made relative to.
    fn asset_root(&self) -> PathBuf;

    /// All files currently known to the project.
    fn files(&self) -> Vec<FileHandle>;
}

/// In-memory file registry for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryFileRegistry {
    root: PathBuf,
    files: RwLock<IndexMap<FileId, FileHandle>>,
}

impl MemoryFileRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a file under `root`, returning its handle.
    pub fn add(&self, relative: impl AsRef<Path>, plugin: impl Into<PluginId>) -> FileHandle {
        let mut files = self.files.write();
        let id = FileId(files.keys().map(|id| id.0 + 1).max().unwrap_or(0));
        let handle = FileHandle::new(id, self.root.join(relative), plugin.into());
        files.insert(id, handle.clone());
        handle
    }

    pub fn remove(&self, id: FileId) -> Option<FileHandle> {
        self.files.write().shift_remove(&id)
    }
}

impl FileRegistry for MemoryFileRegistry {
    fn file(&self, id: FileId) -> Option<FileHandle> {
        self.files.read().get(&id).cloned()
    }

    fn asset_root(&self) -> PathBuf {
        self.root.clone()
    }

    fn files(&self) -> Vec<FileHandle> {
        self.files.read().values().cloned().collect()
    }
}
