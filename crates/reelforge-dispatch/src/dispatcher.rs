//! The [`Dispatcher`] trait and its registry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use reelforge_common::{Error, Result};
use reelforge_crawler::Crawler;
use reelforge_task::{Context, TaskHolder};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Turns a holder plus its input crawlers into scheduled executions.
pub trait Dispatcher: Send + Sync {
    /// Registered type name.
    fn type_name(&self) -> &str;

    /// The options the dispatcher was built from.
    fn options(&self) -> &Map<String, serde_json::Value>;

    /// Schedule the holder tree. Returns process or job identifiers.
    fn dispatch(&self, ctx: &Context, holder: &TaskHolder, crawlers: &[Crawler]) -> Result<Vec<String>>;

    /// Serializable form, enough to rebuild the dispatcher elsewhere.
    fn to_envelope(&self) -> DispatcherEnvelope {
        DispatcherEnvelope {
            type_name: self.type_name().to_string(),
            options: self.options().clone(),
        }
    }
}

/// `{ "type": ..., "options": {...} }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatcherEnvelope {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub options: Map<String, serde_json::Value>,
}

/// Builds a dispatcher from its options.
pub type DispatcherFactory =
    Arc<dyn Fn(&Map<String, serde_json::Value>) -> Result<Box<dyn Dispatcher>> + Send + Sync>;

/// Registry of dispatcher types.
#[derive(Default)]
pub struct DispatcherRegistry {
    factories: RwLock<IndexMap<String, DispatcherFactory>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `local` and `renderfarm`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("local", |options| {
            Ok(Box::new(crate::local::LocalDispatcher::from_options(options)?) as Box<dyn Dispatcher>)
        });
        registry.register("renderfarm", |options| {
            Ok(Box::new(crate::renderfarm::RenderfarmDispatcher::from_options(options)?)
                as Box<dyn Dispatcher>)
        });
        registry
    }

    /// Register (or replace) a dispatcher type.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&Map<String, serde_json::Value>) -> Result<Box<dyn Dispatcher>> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(name.to_string(), Arc::new(factory));
    }

    /// Build a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] for an unknown name.
    pub fn create(&self, name: &str, options: &Map<String, serde_json::Value>) -> Result<Box<dyn Dispatcher>> {
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::type_not_found("dispatcher", name))?;
        factory(options)
    }

    /// Rebuild a dispatcher from its envelope.
    pub fn from_envelope(&self, envelope: &DispatcherEnvelope) -> Result<Box<dyn Dispatcher>> {
        self.create(&envelope.type_name, &envelope.options)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}

impl fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("dispatchers", &self.names())
            .finish()
    }
}

pub(crate) fn bool_option(options: &Map<String, serde_json::Value>, name: &str, default: bool) -> bool {
    options.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub(crate) fn str_option<'a>(options: &'a Map<String, serde_json::Value>, name: &str) -> Option<&'a str> {
    options.get(name).and_then(|v| v.as_str())
}
