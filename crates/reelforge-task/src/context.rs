//! Shared registries and the plugin catalog.

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use reelforge_common::{Error, Result};
use reelforge_crawler::{register_builtin_types, CrawlerRegistry};
use reelforge_template::FunctionRegistry;

use crate::registry::TaskRegistry;
use crate::tasks::register_builtin_tasks;
use crate::wrapper::{register_builtin_wrappers, WrapperRegistry};

/// A compiled-in plugin: registers extra types on a context.
pub type PluginFn = fn(&Context) -> Result<()>;

/// Plugin identifiers known to this process, and which have been loaded.
#[derive(Default)]
pub struct PluginCatalog {
    plugins: RwLock<IndexMap<String, PluginFn>>,
    loaded: RwLock<IndexSet<String>>,
}

impl PluginCatalog {
    /// Make a plugin available under `id`.
    pub fn register(&self, id: &str, plugin: PluginFn) {
        self.plugins.write().insert(id.to_string(), plugin);
    }

    /// Known plugin identifiers.
    pub fn names(&self) -> Vec<String> {
        self.plugins.read().keys().cloned().collect()
    }

    /// Whether `id` has been loaded.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.read().contains(id)
    }
}

/// Everything a task run needs to resolve names: crawler types, template
/// functions, task types, wrappers and plugins.
///
/// Cloning is cheap and shares the registries.
#[derive(Clone, Default)]
pub struct Context {
    pub crawlers: Arc<CrawlerRegistry>,
    pub functions: Arc<FunctionRegistry>,
    pub tasks: Arc<TaskRegistry>,
    pub wrappers: Arc<WrapperRegistry>,
    pub plugins: Arc<PluginCatalog>,
}

impl Context {
    /// A context with empty registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding the built-in crawler types, functions, tasks and
    /// wrappers.
    pub fn with_builtins() -> Result<Self> {
        let ctx = Self {
            functions: Arc::new(FunctionRegistry::with_builtins()),
            ..Self::default()
        };
        register_builtin_types(&ctx.crawlers)?;
        register_builtin_tasks(&ctx.tasks);
        register_builtin_wrappers(&ctx.wrappers);
        Ok(ctx)
    }

    /// Load every listed plugin that is not loaded yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] for an unknown identifier, or the
    /// plugin's own error.
    pub fn ensure_plugins<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        for id in ids {
            self.load_plugin(id.as_ref())?;
        }
        Ok(())
    }

    fn load_plugin(&self, id: &str) -> Result<()> {
        if self.plugins.is_loaded(id) {
            return Ok(());
        }
        let plugin = self
            .plugins
            .plugins
            .read()
            .get(id)
            .copied()
            .ok_or_else(|| Error::type_not_found("plugin", id))?;

        plugin(self)?;
        self.plugins.loaded.write().insert(id.to_string());
        tracing::info!("Loaded plugin {id}");
        Ok(())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("crawlers", &self.crawlers)
            .field("functions", &self.functions)
            .field("tasks", &self.tasks)
            .field("plugins", &self.plugins.names())
            .finish_non_exhaustive()
    }
}
