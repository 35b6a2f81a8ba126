//! Template evaluation.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use reelforge_common::{Error, Result, Value};
use reelforge_crawler::Crawler;

use crate::ast::{self, Node};
use crate::registry::FunctionRegistry;

/// A parsed template with a per-instance memo of function results.
///
/// A call is evaluated at most once per distinct resolved call text for the
/// lifetime of the instance, so `(newver <parent>)` referenced twice yields
/// the same version. Cloning produces an instance with an empty memo.
///
/// ```
/// use std::sync::Arc;
/// use indexmap::IndexMap;
/// use reelforge_template::{FunctionRegistry, Template};
///
/// let functions = Arc::new(FunctionRegistry::with_builtins());
/// let template = Template::new("{shot}/{shot}_(pad {frame} 4).exr", functions).unwrap();
///
/// let mut vars = IndexMap::new();
/// vars.insert("shot".to_string(), "sh010".into());
/// vars.insert("frame".to_string(), 7.into());
/// assert_eq!(template.value(&vars).unwrap(), "sh010/sh010_0007.exr");
/// ```
pub struct Template {
    input: String,
    nodes: Vec<Node>,
    var_names: IndexSet<String>,
    functions: Arc<FunctionRegistry>,
    memo: Mutex<HashMap<String, String>>,
}

impl Template {
    /// Parse `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateSyntax`] for malformed input.
    pub fn new(input: impl Into<String>, functions: Arc<FunctionRegistry>) -> Result<Self> {
        let input = input.into();
        let nodes = ast::parse(&input)?;
        let var_names = ast::var_names(&nodes);
        Ok(Self {
            input,
            nodes,
            var_names,
            functions,
            memo: Mutex::new(HashMap::new()),
        })
    }

    /// The raw template string.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Variable names referenced by the template, in first-seen order.
    pub fn var_names(&self) -> &IndexSet<String> {
        &self.var_names
    }

    /// Resolve against a variable map.
    ///
    /// # Errors
    ///
    /// - [`Error::VariableNotFound`] when a referenced variable is missing.
    /// - [`Error::RequiredPathNotFound`] when a `/!` segment does not exist.
    /// - Errors raised by the called functions.
    pub fn value(&self, vars: &IndexMap<String, Value>) -> Result<String> {
        for name in &self.var_names {
            if !vars.contains_key(name) {
                return Err(Error::variable_not_found(name, &self.input));
            }
        }

        let mut out = String::new();
        let mut required = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Literal(text) => out.push_str(text),
                Node::Var(name) => out.push_str(&self.lookup(vars, name)?),
                Node::Parent => {
                    let parent = parent_of(&out).to_string();
                    out.push_str(&parent);
                }
                Node::RequiredPath => {
                    out.push('/');
                    required.push(out.len());
                }
                Node::Call(body) => {
                    let parent = parent_of(&out).to_string();
                    let result = self.call(body, vars, &parent)?;
                    out.push_str(&result);
                }
            }
        }

        for start in required {
            let end = out[start..]
                .find('/')
                .map_or(out.len(), |offset| start + offset);
            let path = Path::new(&out[..end]);
            if !path.exists() {
                return Err(Error::RequiredPathNotFound {
                    path: PathBuf::from(path),
                });
            }
        }

        tracing::debug!("Resolved template {:?} -> {:?}", self.input, out);
        Ok(out)
    }

    /// Resolve against a crawler's variables, with `extra` taking priority.
    pub fn value_from_crawler(
        &self,
        crawler: &Crawler,
        extra: &IndexMap<String, Value>,
    ) -> Result<String> {
        if extra.is_empty() {
            return self.value(crawler.vars());
        }
        let mut vars = crawler.vars().clone();
        for (name, value) in extra {
            vars.insert(name.clone(), value.clone());
        }
        self.value(&vars)
    }

    fn lookup(&self, vars: &IndexMap<String, Value>, name: &str) -> Result<String> {
        vars.get(name)
            .map(|v| v.to_string())
            .ok_or_else(|| Error::variable_not_found(name, &self.input))
    }

    fn call(&self, body: &[Node], vars: &IndexMap<String, Value>, parent: &str) -> Result<String> {
        let mut text = String::new();
        for node in body {
            match node {
                Node::Literal(literal) => text.push_str(literal),
                Node::Var(name) => text.push_str(&self.lookup(vars, name)?),
                Node::Parent => text.push_str(parent),
                Node::RequiredPath => text.push_str("/!"),
                Node::Call(inner) => text.push_str(&self.call(inner, vars, parent)?),
            }
        }

        let key = text.trim().to_string();
        if let Some(cached) = self.memo.lock().get(&key) {
            return Ok(cached.clone());
        }

        let mut parts = key.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| Error::TemplateSyntax(format!("empty call in {:?}", self.input)))?;
        let args: Vec<&str> = parts.collect();
        let result = self.functions.call(name, &args)?;

        self.memo.lock().insert(key, result.clone());
        Ok(result)
    }
}

fn parent_of(out: &str) -> &str {
    let trimmed = out.trim_end_matches('/');
    if trimmed.is_empty() && out.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Whether a resolved template value counts as true.
///
/// `""`, `"0"` and `"false"` (case-insensitive, trimmed) are false.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

impl Clone for Template {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            nodes: self.nodes.clone(),
            var_names: self.var_names.clone(),
            functions: Arc::clone(&self.functions),
            memo: Mutex::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}
