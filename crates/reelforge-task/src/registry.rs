//! Name → [`TaskKind`] registry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use reelforge_common::{Error, Result};

use crate::task::{Task, TaskKind};

/// Registry of task types.
#[derive(Default)]
pub struct TaskRegistry {
    kinds: RwLock<IndexMap<String, Arc<dyn TaskKind>>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a task type.
    pub fn register(&self, name: &str, kind: Arc<dyn TaskKind>) {
        self.kinds.write().insert(name.to_string(), kind);
        tracing::debug!("Registered task type {name}");
    }

    /// Create an empty task of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] for an unknown name.
    pub fn create(&self, name: &str) -> Result<Task> {
        let kind = self
            .kinds
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::type_not_found("task", name))?;
        Ok(Task::new(name, kind))
    }

    /// Whether a type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.read().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.kinds.read().keys().cloned().collect()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::{json, Map};

    struct Versioned;

    impl TaskKind for Versioned {
        fn default_options(&self) -> Map<String, serde_json::Value> {
            let mut options = Map::new();
            options.insert("version".into(), json!(1));
            options
        }
    }

    #[test]
    fn create_applies_default_options() {
        let registry = TaskRegistry::new();
        registry.register("versioned", Arc::new(Versioned));
        let task = registry.create("versioned").unwrap();
        assert_eq!(task.type_name(), "versioned");
        assert_eq!(task.option("version"), Some(&json!(1)));
    }

    #[test]
    fn unknown_task() {
        let registry = TaskRegistry::new();
        assert_matches!(
            registry.create("convertImage"),
            Err(Error::TypeNotFound { kind, name }) if kind == "task" && name == "convertImage"
        );
    }
}
