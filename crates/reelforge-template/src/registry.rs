//! Name → callable registry of template functions.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use reelforge_common::{Error, Result};

/// A template function: receives the whitespace-split arguments.
pub type TemplateFn = Arc<dyn Fn(&[&str]) -> Result<String> + Send + Sync>;

/// Registry of template functions.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<IndexMap<String, TemplateFn>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in functions.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::functions::register_builtin_functions(&registry);
        registry
    }

    /// Register (or replace) a function.
    pub fn register<F>(&self, name: &str, function: F)
    where
        F: Fn(&[&str]) -> Result<String> + Send + Sync + 'static,
    {
        self.functions
            .write()
            .insert(name.to_string(), Arc::new(function));
    }

    /// Look up a function.
    pub fn get(&self, name: &str) -> Result<TemplateFn> {
        self.functions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::type_not_found("template function", name))
    }

    /// Run a function.
    ///
    /// Failures other than [`Error::TemplateFunction`] are wrapped into one
    /// naming the function.
    pub fn call(&self, name: &str, args: &[&str]) -> Result<String> {
        let function = self.get(name)?;
        function(args).map_err(|e| match e {
            Error::TemplateFunction { .. } => e,
            other => Error::template_function(name, other.to_string()),
        })
    }

    /// Whether a function is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.functions.read().keys().cloned().collect()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn register_and_call() {
        let registry = FunctionRegistry::new();
        registry.register("join", |args| Ok(args.join("-")));
        assert_eq!(registry.call("join", &["a", "b"]).unwrap(), "a-b");
    }

    #[test]
    fn unknown_function() {
        let registry = FunctionRegistry::new();
        assert_matches!(
            registry.call("nope", &[]),
            Err(Error::TypeNotFound { name, .. }) if name == "nope"
        );
    }

    #[test]
    fn foreign_errors_are_wrapped() {
        let registry = FunctionRegistry::new();
        registry.register("fail", |_| Err(Error::config("bad")));
        assert_matches!(
            registry.call("fail", &[]),
            Err(Error::TemplateFunction { function, .. }) if function == "fail"
        );
    }
}
