//! Filesystem crawler types: the `fs` family root, plain files,
//! directories and a few text formats.

use std::fs;

use reelforge_common::paths::has_illegal_characters;
use reelforge_common::{Error, PathHolder, Result, Value};

use crate::crawler::Crawler;
use crate::registry::{CrawlerRegistry, CrawlerSource, CrawlerType};

/// Family root for everything on disk. Never accepts input by itself.
pub struct FsType;

impl CrawlerType for FsType {
    fn test(&self, _source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(false)
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        Ok(Crawler::from_path(require_path(source)?, parent))
    }
}

/// Any path that is not an existing directory.
pub struct FileType;

impl CrawlerType for FileType {
    fn test(&self, source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(source.as_path().is_some_and(|p| !p.is_dir()))
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        Ok(Crawler::from_path(require_path(source)?, parent))
    }
}

/// An existing directory. Its children are the directory entries.
pub struct DirectoryType;

impl CrawlerType for DirectoryType {
    fn test(&self, source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(source.as_path().is_some_and(PathHolder::is_dir))
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        let mut crawler = Crawler::from_path(require_path(source)?, parent);
        // Directory names are never sequence members.
        let base_name = crawler.path().base_name();
        crawler.set_var("name", base_name, false);
        Ok(crawler)
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn compute_children(&self, crawler: &Crawler, registry: &CrawlerRegistry) -> Vec<Crawler> {
        let entries = match fs::read_dir(crawler.path().as_path()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot list directory {}: {e}", crawler.path());
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.file_name().to_string_lossy().to_string()),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {e}", crawler.path());
                    None
                }
            })
            .collect();
        names.sort();

        let mut children = Vec::with_capacity(names.len());
        for name in names {
            if has_illegal_characters(&name) {
                tracing::warn!("Skipping {name:?} in {}: illegal characters", crawler.path());
                continue;
            }
            let child_path = crawler.path().join(&name);
            match registry.create(child_path, Some(crawler)) {
                Ok(child) => children.push(child),
                Err(e) => tracing::warn!("Skipping {name:?} in {}: {e}", crawler.path()),
            }
        }
        children
    }
}

/// Files matched purely by extension.
pub struct ExtensionType {
    extensions: &'static [&'static str],
}

impl ExtensionType {
    /// Accept files whose lower-case extension is in `extensions`.
    pub const fn new(extensions: &'static [&'static str]) -> Self {
        Self { extensions }
    }

    pub(crate) fn accepts(&self, path: &PathHolder) -> bool {
        !path.is_dir() && self.extensions.contains(&path.ext().as_str())
    }
}

impl CrawlerType for ExtensionType {
    fn test(&self, source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(source.as_path().is_some_and(|p| self.accepts(p)))
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        Ok(Crawler::from_path(require_path(source)?, parent))
    }
}

/// A `.json` file; when it exists, its top-level keys become variables.
pub struct JsonType;

impl CrawlerType for JsonType {
    fn test(&self, source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(source
            .as_path()
            .is_some_and(|p| !p.is_dir() && p.ext() == "json"))
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        let path = require_path(source)?;
        let mut crawler = Crawler::from_path(path.clone(), parent);
        if !path.exists() {
            return Ok(crawler);
        }

        let contents = fs::read_to_string(path.as_path())?;
        let parsed: serde_json::Value = serde_json::from_str(&contents)?;
        if let serde_json::Value::Object(map) = parsed {
            for (key, value) in &map {
                crawler.set_var(key, Value::from_json(value), false);
            }
        }
        Ok(crawler)
    }
}

pub(crate) fn require_path(source: &CrawlerSource) -> Result<PathHolder> {
    source
        .as_path()
        .cloned()
        .ok_or_else(|| Error::config(format!("expected a filesystem path, got {source}")))
}
