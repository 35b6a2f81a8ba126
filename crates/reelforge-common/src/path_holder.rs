//! Lazy filesystem path wrapper.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A path string whose filesystem queries are computed once and cached.
///
/// Crawlers are created in bulk during directory scans and queried many
/// times by type predicates, so `exists`/`is_dir` only touch the filesystem
/// on first use.
#[derive(Clone, Default)]
pub struct PathHolder {
    path: String,
    exists: OnceLock<bool>,
    is_dir: OnceLock<bool>,
}

impl PathHolder {
    /// Wrap a path. Trailing separators (other than a bare root) are removed.
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        Self {
            path,
            exists: OnceLock::new(),
            is_dir: OnceLock::new(),
        }
    }

    /// The wrapped path string.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The wrapped path as a [`Path`].
    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }

    /// Whether the path exists on disk.
    pub fn exists(&self) -> bool {
        *self.exists.get_or_init(|| self.as_path().exists())
    }

    /// Whether the path is an existing directory.
    pub fn is_dir(&self) -> bool {
        *self.is_dir.get_or_init(|| self.as_path().is_dir())
    }

    /// Final path component (including the extension).
    pub fn base_name(&self) -> String {
        self.as_path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Parent directory (empty for a bare name).
    pub fn dir_name(&self) -> String {
        self.as_path()
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Lower-case extension without the dot (empty for none).
    pub fn ext(&self) -> String {
        self.as_path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Join a child component.
    pub fn join(&self, child: &str) -> PathHolder {
        let joined: PathBuf = self.as_path().join(child);
        PathHolder::new(joined.to_string_lossy().to_string())
    }

    /// Drop cached filesystem state so the next query hits the disk again.
    pub fn invalidate(&mut self) {
        self.exists = OnceLock::new();
        self.is_dir = OnceLock::new();
    }
}

impl fmt::Debug for PathHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathHolder({:?})", self.path)
    }
}

impl fmt::Display for PathHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl PartialEq for PathHolder {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for PathHolder {}

impl From<&str> for PathHolder {
    fn from(value: &str) -> Self {
        PathHolder::new(value)
    }
}

impl From<&Path> for PathHolder {
    fn from(value: &Path) -> Self {
        PathHolder::new(value.to_string_lossy().to_string())
    }
}

impl Serialize for PathHolder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> Deserialize<'de> for PathHolder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(PathHolder::new(path))
    }
}
