//! Priority-ordered crawler type registry.
//!
//! Types are kept in insertion order and tested in *reverse* order, so a
//! type registered later (e.g. by a plugin) takes priority over built-ins
//! that would accept the same input.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use reelforge_common::{Error, PathHolder, Result};

use crate::crawler::Crawler;

/// Input a crawler is created from.
#[derive(Debug, Clone)]
pub enum CrawlerSource {
    /// A filesystem path.
    Path(PathHolder),
    /// An in-memory JSON blob.
    Data(serde_json::Value),
}

impl CrawlerSource {
    /// The path, when this source is a path.
    pub fn as_path(&self) -> Option<&PathHolder> {
        match self {
            CrawlerSource::Path(path) => Some(path),
            CrawlerSource::Data(_) => None,
        }
    }
}

impl fmt::Display for CrawlerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlerSource::Path(path) => write!(f, "{path}"),
            CrawlerSource::Data(data) => write!(f, "{data}"),
        }
    }
}

impl From<PathHolder> for CrawlerSource {
    fn from(value: PathHolder) -> Self {
        CrawlerSource::Path(value)
    }
}

impl From<&str> for CrawlerSource {
    fn from(value: &str) -> Self {
        CrawlerSource::Path(PathHolder::new(value))
    }
}

/// Behaviour of one registered crawler type.
///
/// Implementations are small constructor functions over the shared
/// [`Crawler`] base rather than an inheritance chain.
pub trait CrawlerType: Send + Sync {
    /// Whether this type accepts the input.
    fn test(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<bool>;

    /// Build the crawler. The registry stamps the `type` var afterwards.
    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler>;

    /// Whether crawlers of this type never have children.
    fn is_leaf(&self) -> bool {
        true
    }

    /// Compute the direct children of a crawler of this type.
    fn compute_children(&self, _crawler: &Crawler, _registry: &CrawlerRegistry) -> Vec<Crawler> {
        Vec::new()
    }
}

struct Entry {
    name: String,
    lineage: Vec<String>,
    kind: Arc<dyn CrawlerType>,
}

/// Registry of crawler types.
///
/// Registration goes through a shared reference so plugins can extend a
/// registry that is already in use.
#[derive(Default)]
pub struct CrawlerRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl CrawlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, optionally as a member of the `parent` type's family.
    ///
    /// Re-registering an existing name replaces its behaviour but keeps its
    /// original position in the priority order. A changed parent is
    /// propagated to every type already registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] when `parent` is not registered, and
    /// [`Error::Config`] when `parent` is `name` or one of its descendants.
    pub fn register(
        &self,
        name: &str,
        parent: Option<&str>,
        kind: Arc<dyn CrawlerType>,
    ) -> Result<()> {
        let mut entries = self.entries.write();

        let mut lineage = vec![name.to_string()];
        if let Some(parent) = parent {
            let parent_entry = entries
                .iter()
                .find(|e| e.name == parent)
                .ok_or_else(|| Error::type_not_found("crawler", parent))?;
            if parent_entry.lineage.iter().any(|l| l == name) {
                return Err(Error::config(format!(
                    "crawler type {name} cannot be registered under its own descendant {parent}"
                )));
            }
            lineage.extend(parent_entry.lineage.iter().cloned());
        }

        match entries.iter().position(|e| e.name == name) {
            Some(index) => {
                entries[index].kind = kind;
                if entries[index].lineage != lineage {
                    for entry in entries.iter_mut() {
                        // Descendants keep their chain down to `name` and
                        // take the new ancestry above it.
                        if let Some(pos) = entry.lineage.iter().position(|l| l == name) {
                            entry.lineage.truncate(pos);
                            entry.lineage.extend(lineage.iter().cloned());
                        }
                    }
                }
            }
            None => entries.push(Entry {
                name: name.to_string(),
                lineage,
                kind,
            }),
        }
        tracing::debug!("Registered crawler type {name}");
        Ok(())
    }

    /// Create a crawler with the most recently registered type accepting
    /// the input.
    ///
    /// # Errors
    ///
    /// - [`Error::TestCrawler`] / [`Error::CreateCrawler`] when a type's
    ///   predicate or constructor fails.
    /// - [`Error::NoCrawlerType`] when no type accepts the input.
    pub fn create(
        &self,
        source: impl Into<CrawlerSource>,
        parent: Option<&Crawler>,
    ) -> Result<Crawler> {
        let source = source.into();
        let candidates: Vec<(String, Arc<dyn CrawlerType>)> = self
            .entries
            .read()
            .iter()
            .rev()
            .map(|e| (e.name.clone(), Arc::clone(&e.kind)))
            .collect();

        for (name, kind) in candidates {
            let accepted = kind
                .test(&source, parent)
                .map_err(|e| Error::TestCrawler {
                    type_name: name.clone(),
                    input: source.to_string(),
                    message: e.to_string(),
                })?;
            if !accepted {
                continue;
            }

            let mut crawler = kind
                .create(&source, parent)
                .map_err(|e| Error::CreateCrawler {
                    type_name: name.clone(),
                    input: source.to_string(),
                    message: e.to_string(),
                })?;
            crawler.set_type(&name);
            crawler.set_leaf(kind.is_leaf());
            return Ok(crawler);
        }

        Err(Error::NoCrawlerType {
            input: source.to_string(),
        })
    }

    /// Look up a registered type.
    pub fn get(&self, name: &str) -> Result<Arc<dyn CrawlerType>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.kind))
            .ok_or_else(|| Error::type_not_found("crawler", name))
    }

    /// Whether a type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|e| e.name == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name.clone()).collect()
    }

    /// `name` itself plus every type registered under it, in registration
    /// order. Unknown names yield an empty list.
    pub fn registered_sub_types(&self, name: &str) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.lineage.iter().any(|l| l == name))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Whether `type_name` belongs to the `family` type.
    pub fn is_a(&self, type_name: &str, family: &str) -> bool {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == type_name)
            .is_some_and(|e| e.lineage.iter().any(|l| l == family))
    }
}

impl fmt::Debug for CrawlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerRegistry")
            .field("types", &self.names())
            .finish()
    }
}
