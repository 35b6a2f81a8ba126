//! The [`Crawler`] node: a typed filesystem entry (or data blob) carrying
//! variables, tags and lazily computed children.

use std::fmt;
use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};
use reelforge_common::paths::{parse_sequence_name, strip_extension};
use reelforge_common::{Error, PathHolder, Result, Value};
use serde::{Deserialize, Serialize};

use crate::registry::CrawlerRegistry;

/// Name of the variable holding the registered type name.
pub const TYPE_VAR: &str = "type";

/// Restricts [`Crawler::glob`] results by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Only crawlers whose `type` var equals this name.
    Exact(String),
    /// Crawlers of this registered type or any type registered under it.
    Family(String),
}

/// A typed node describing a file, directory or synthetic data blob.
///
/// Variables are insertion ordered. A subset of them is flagged as context
/// variables, which follow the crawler into children and task outputs.
pub struct Crawler {
    path: PathHolder,
    vars: IndexMap<String, Value>,
    context_vars: IndexSet<String>,
    tags: IndexMap<String, Value>,
    leaf: bool,
    children: OnceLock<Vec<Crawler>>,
}

/// Serializable form used for cross-process hand-off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlerEnvelope {
    pub vars: IndexMap<String, Value>,
    #[serde(rename = "contextVarNames", default)]
    pub context_var_names: Vec<String>,
    #[serde(default)]
    pub tags: IndexMap<String, Value>,
}

impl Crawler {
    /// Create a crawler for a filesystem path.
    ///
    /// All of the parent's variables (and their context flags) are copied
    /// first, then the path-derived variables are set: `filePath`,
    /// `baseName`, `name`, `ext`, `path`, and for sequence members `frame`
    /// and `padding`.
    pub fn from_path(path: PathHolder, parent: Option<&Crawler>) -> Self {
        let mut crawler = Self::empty(path, parent);
        let path = crawler.path.clone();
        let base_name = path.base_name();

        crawler.insert_var("filePath", Value::from(path.as_str()));
        crawler.insert_var("baseName", Value::from(base_name.as_str()));
        crawler.insert_var("path", Value::from(path.dir_name()));
        crawler.insert_var("ext", Value::from(path.ext()));

        match parse_sequence_name(&base_name) {
            Some(seq) => {
                crawler.insert_var("name", Value::from(seq.name));
                crawler.insert_var("frame", Value::from(seq.frame));
                crawler.insert_var("padding", Value::from(seq.padding));
            }
            None => {
                crawler.insert_var("name", Value::from(strip_extension(&base_name)));
                crawler.vars.shift_remove("frame");
                crawler.vars.shift_remove("padding");
            }
        }
        crawler
    }

    /// Create a crawler without any path-derived variables.
    pub fn empty(path: PathHolder, parent: Option<&Crawler>) -> Self {
        let (vars, context_vars) = match parent {
            Some(parent) => (parent.vars.clone(), parent.context_vars.clone()),
            None => (IndexMap::new(), IndexSet::new()),
        };
        Self {
            path,
            vars,
            context_vars,
            tags: IndexMap::new(),
            leaf: true,
            children: OnceLock::new(),
        }
    }

    /// Rebuild a crawler from its JSON envelope.
    ///
    /// The `type` var must name a registered type; `filePath` (or
    /// `fullPath`) gives the crawler its path.
    pub fn from_envelope(registry: &CrawlerRegistry, envelope: CrawlerEnvelope) -> Result<Self> {
        let type_name = envelope
            .vars
            .get(TYPE_VAR)
            .map(|v| v.to_string())
            .ok_or_else(|| Error::InvalidVar(TYPE_VAR.into()))?;
        let kind = registry.get(&type_name)?;

        let path = envelope
            .vars
            .get("filePath")
            .or_else(|| envelope.vars.get("fullPath"))
            .map(|v| v.to_string())
            .ok_or_else(|| Error::InvalidVar("filePath".into()))?;

        Ok(Self {
            path: PathHolder::new(path),
            vars: envelope.vars,
            context_vars: envelope.context_var_names.into_iter().collect(),
            tags: envelope.tags,
            leaf: kind.is_leaf(),
            children: OnceLock::new(),
        })
    }

    /// Rebuild a crawler from a JSON string.
    pub fn from_json(registry: &CrawlerRegistry, json: &str) -> Result<Self> {
        let envelope: CrawlerEnvelope = serde_json::from_str(json)?;
        Self::from_envelope(registry, envelope)
    }

    /// The serializable envelope for this crawler.
    pub fn to_envelope(&self) -> CrawlerEnvelope {
        CrawlerEnvelope {
            vars: self.vars.clone(),
            context_var_names: self.context_vars.iter().cloned().collect(),
            tags: self.tags.clone(),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_envelope())?)
    }

    /// The registered type name (empty before registration).
    pub fn type_name(&self) -> String {
        self.vars
            .get(TYPE_VAR)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    /// The crawler's path.
    pub fn path(&self) -> &PathHolder {
        &self.path
    }

    /// The full path string (`filePath` var, falling back to the holder).
    pub fn file_path(&self) -> String {
        match self.vars.get("filePath") {
            Some(value) => value.to_string(),
            None => self.path.to_string(),
        }
    }

    /// The crawler's display name (`name` var, falling back to the base name).
    pub fn name(&self) -> String {
        match self.vars.get("name") {
            Some(value) => value.to_string(),
            None => self.path.base_name(),
        }
    }

    /// Whether this crawler has no children.
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub(crate) fn set_leaf(&mut self, leaf: bool) {
        self.leaf = leaf;
    }

    pub(crate) fn set_type(&mut self, type_name: &str) {
        self.vars
            .insert(TYPE_VAR.to_string(), Value::from(type_name));
    }

    /// Look up a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVar`] when the variable is not set.
    pub fn var(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| Error::InvalidVar(name.to_string()))
    }

    /// Whether a variable is set.
    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Set a variable, optionally flagging it as a context variable.
    ///
    /// The `type` var belongs to the registry and is left untouched.
    pub fn set_var(&mut self, name: &str, value: impl Into<Value>, is_context: bool) {
        if name == TYPE_VAR {
            tracing::warn!(
                "Ignoring attempt to overwrite the type of crawler {}",
                self.path
            );
            return;
        }
        self.insert_var(name, value.into());
        if is_context {
            self.context_vars.insert(name.to_string());
        } else {
            self.context_vars.shift_remove(name);
        }
    }

    fn insert_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Variable names in insertion order.
    pub fn var_names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    /// All variables.
    pub fn vars(&self) -> &IndexMap<String, Value> {
        &self.vars
    }

    /// Names of the variables flagged as context variables.
    pub fn context_var_names(&self) -> Vec<String> {
        self.context_vars.iter().cloned().collect()
    }

    /// Whether a variable is flagged as a context variable.
    pub fn is_context_var(&self, name: &str) -> bool {
        self.context_vars.contains(name)
    }

    /// Look up a tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] when the tag is not set.
    pub fn tag(&self, name: &str) -> Result<&Value> {
        self.tags
            .get(name)
            .ok_or_else(|| Error::InvalidTag(name.to_string()))
    }

    /// Set a tag. Tags are not inherited by children.
    pub fn set_tag(&mut self, name: &str, value: impl Into<Value>) {
        self.tags.insert(name.to_string(), value.into());
    }

    /// Tag names in insertion order.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    /// Children of a directory-like crawler, computed once and cached.
    pub fn children(&self, registry: &CrawlerRegistry) -> &[Crawler] {
        if self.leaf {
            return &[];
        }
        self.children
            .get_or_init(|| self.compute_children(registry))
    }

    fn compute_children(&self, registry: &CrawlerRegistry) -> Vec<Crawler> {
        match registry.get(&self.type_name()) {
            Ok(kind) => kind.compute_children(self, registry),
            Err(e) => {
                tracing::warn!("Cannot compute children of {}: {e}", self.path);
                Vec::new()
            }
        }
    }

    /// Drop the cached children so the next query rescans.
    pub fn invalidate_cache(&mut self) {
        self.children = OnceLock::new();
        self.path.invalidate();
    }

    /// This crawler followed by all descendants, depth-first pre-order.
    ///
    /// An empty `filters` list keeps everything. With `use_cache` false the
    /// children are recomputed without touching the cache.
    pub fn glob(
        &self,
        registry: &CrawlerRegistry,
        filters: &[TypeFilter],
        use_cache: bool,
    ) -> Vec<Crawler> {
        let allowed = expand_filters(registry, filters);
        let mut out = Vec::new();
        self.glob_into(registry, allowed.as_ref(), use_cache, &mut out);
        out
    }

    fn glob_into(
        &self,
        registry: &CrawlerRegistry,
        allowed: Option<&(Vec<String>, Vec<String>)>,
        use_cache: bool,
        out: &mut Vec<Crawler>,
    ) {
        let keep = match allowed {
            None => true,
            Some((exact, family)) => {
                let type_name = self.type_name();
                exact.contains(&type_name) || family.contains(&type_name)
            }
        };
        if keep {
            out.push(self.clone());
        }
        if self.leaf {
            return;
        }

        if use_cache {
            for child in self.children(registry) {
                child.glob_into(registry, allowed, use_cache, out);
            }
        } else {
            for child in self.compute_children(registry) {
                child.glob_into(registry, allowed, use_cache, out);
            }
        }
    }

    /// Group crawlers by the value of a tag, preserving first-seen order.
    ///
    /// Crawlers without the tag each form their own group.
    pub fn group(crawlers: Vec<Crawler>, tag: &str) -> Vec<Vec<Crawler>> {
        let mut groups: IndexMap<String, Vec<Crawler>> = IndexMap::new();
        let mut untagged = 0usize;
        for crawler in crawlers {
            let key = match crawler.tags.get(tag) {
                Some(value) => format!("tag:{value}"),
                None => {
                    untagged += 1;
                    format!("untagged:{untagged}")
                }
            };
            groups.entry(key).or_default().push(crawler);
        }
        groups.into_values().collect()
    }
}

fn expand_filters(
    registry: &CrawlerRegistry,
    filters: &[TypeFilter],
) -> Option<(Vec<String>, Vec<String>)> {
    if filters.is_empty() {
        return None;
    }
    let mut exact = Vec::new();
    let mut family = Vec::new();
    for filter in filters {
        match filter {
            TypeFilter::Exact(name) => exact.push(name.clone()),
            TypeFilter::Family(name) => family.extend(registry.registered_sub_types(name)),
        }
    }
    Some((exact, family))
}

impl Clone for Crawler {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            vars: self.vars.clone(),
            context_vars: self.context_vars.clone(),
            tags: self.tags.clone(),
            leaf: self.leaf,
            children: OnceLock::new(),
        }
    }
}

impl fmt::Debug for Crawler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crawler")
            .field("type", &self.type_name())
            .field("path", &self.path.as_str())
            .field("vars", &self.vars)
            .field("context_vars", &self.context_vars)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
