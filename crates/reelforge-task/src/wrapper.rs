//! Task wrappers: where a task's `output()` actually runs.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use reelforge_common::{Error, Result};
use reelforge_crawler::{Crawler, CrawlerEnvelope};
use serde_json::Map;

use crate::context::Context;
use crate::task::Task;

/// Metadata key naming the wrapper of a task.
pub const WRAPPER_NAME_METADATA: &str = "wrapper.name";

/// Metadata key holding the wrapper options.
pub const WRAPPER_OPTIONS_METADATA: &str = "wrapper.options";

/// Runs a task in some execution context.
pub trait TaskWrapper: Send + Sync {
    /// Run the task and return its output crawlers.
    fn run(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>>;
}

/// Builds a wrapper from its options.
pub type WrapperFactory =
    Arc<dyn Fn(&Map<String, serde_json::Value>) -> Result<Box<dyn TaskWrapper>> + Send + Sync>;

/// Registry of wrapper types.
#[derive(Default)]
pub struct WrapperRegistry {
    factories: RwLock<IndexMap<String, WrapperFactory>>,
}

impl WrapperRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a wrapper type.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&Map<String, serde_json::Value>) -> Result<Box<dyn TaskWrapper>> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(name.to_string(), Arc::new(factory));
    }

    /// Build a wrapper.
    pub fn create(&self, name: &str, options: &Map<String, serde_json::Value>) -> Result<Box<dyn TaskWrapper>> {
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::type_not_found("wrapper", name))?;
        factory(options)
    }

    /// Build the wrapper selected by the task's `wrapper.*` metadata
    /// (`default` when unset).
    pub fn for_task(&self, task: &Task) -> Result<Box<dyn TaskWrapper>> {
        let name = task
            .metadata(WRAPPER_NAME_METADATA)
            .and_then(|v| v.as_str())
            .unwrap_or("default");
        let options = task
            .metadata(WRAPPER_OPTIONS_METADATA)
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        self.create(name, &options)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}

impl fmt::Debug for WrapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperRegistry")
            .field("wrappers", &self.names())
            .finish()
    }
}

/// Runs the task synchronously in this process.
pub struct DefaultWrapper;

impl TaskWrapper for DefaultWrapper {
    fn run(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        task.output(ctx)
    }
}

/// Runs the task in a child process: `<executable> exec-task <task> <result>`.
///
/// Options: `executable` (defaults to the current executable) and
/// `args` (extra arguments placed before `exec-task`).
pub struct SubprocessWrapper {
    executable: PathBuf,
    args: Vec<String>,
}

impl SubprocessWrapper {
    /// Build from wrapper options.
    pub fn from_options(options: &Map<String, serde_json::Value>) -> Result<Self> {
        let executable = match options.get("executable").and_then(|v| v.as_str()) {
            Some(path) => PathBuf::from(path),
            None => std::env::current_exe()?,
        };
        let args = options
            .get("args")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { executable, args })
    }
}

impl TaskWrapper for SubprocessWrapper {
    fn run(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        let dir = tempfile::Builder::new().prefix("reelforge-task-").tempdir()?;
        let task_file = dir.path().join("task.json");
        let result_file = dir.path().join("result.json");
        fs::write(&task_file, task.to_json()?)?;

        tracing::info!(
            "Running task {} in subprocess {}",
            task.type_name(),
            self.executable.display()
        );
        let output = Command::new(&self.executable)
            .args(&self.args)
            .arg("exec-task")
            .arg(&task_file)
            .arg(&result_file)
            .output()?;
        if !output.status.success() {
            return Err(Error::command(
                self.executable.display().to_string(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        read_result_file(ctx, &result_file)
    }
}

/// Entry point of a task subprocess: load a task file, run it in process
/// and write the output crawlers.
pub fn run_task_file(ctx: &Context, task_file: &Path, result_file: &Path) -> Result<Vec<Crawler>> {
    let task = Task::from_json(ctx, &fs::read_to_string(task_file)?)?;
    let outputs = task.output(ctx)?;
    write_result_file(result_file, &outputs)?;
    Ok(outputs)
}

/// Write crawlers as a JSON array of envelopes.
pub fn write_result_file(path: &Path, crawlers: &[Crawler]) -> Result<()> {
    let envelopes: Vec<CrawlerEnvelope> = crawlers.iter().map(Crawler::to_envelope).collect();
    fs::write(path, serde_json::to_string_pretty(&envelopes)?)?;
    Ok(())
}

/// Read a JSON array of crawler envelopes.
pub fn read_result_file(ctx: &Context, path: &Path) -> Result<Vec<Crawler>> {
    let envelopes: Vec<CrawlerEnvelope> = serde_json::from_str(&fs::read_to_string(path)?)?;
    envelopes
        .into_iter()
        .map(|envelope| Crawler::from_envelope(&ctx.crawlers, envelope))
        .collect()
}

/// Register the `default` and `subprocess` wrappers.
pub fn register_builtin_wrappers(registry: &WrapperRegistry) {
    registry.register("default", |_| Ok(Box::new(DefaultWrapper) as Box<dyn TaskWrapper>));
    registry.register("subprocess", |options| {
        Ok(Box::new(SubprocessWrapper::from_options(options)?) as Box<dyn TaskWrapper>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // `assert_matches!` formats the scrutinee on failure.
    impl fmt::Debug for dyn TaskWrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("TaskWrapper")
        }
    }

    #[test]
    fn default_wrapper_when_unset() {
        let ctx = Context::with_builtins().unwrap();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.add(ctx.crawlers.create("/a/b.exr", None).unwrap(), "/c/d.exr");
        let wrapper = ctx.wrappers.for_task(&task).unwrap();
        assert_eq!(wrapper.run(&task, &ctx).unwrap().len(), 1);
    }

    #[test]
    fn unknown_wrapper() {
        let ctx = Context::with_builtins().unwrap();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_metadata(WRAPPER_NAME_METADATA, "maya");
        assert_matches!(
            ctx.wrappers.for_task(&task),
            Err(Error::TypeNotFound { kind, .. }) if kind == "wrapper"
        );
    }

    #[test]
    fn subprocess_options() {
        let options = json!({"executable": "/opt/reelforge/bin/reelforge", "args": ["-v"]});
        let wrapper = SubprocessWrapper::from_options(options.as_object().unwrap()).unwrap();
        assert_eq!(wrapper.executable, PathBuf::from("/opt/reelforge/bin/reelforge"));
        assert_eq!(wrapper.args, vec!["-v"]);
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_failure_is_a_command_error() {
        let ctx = Context::with_builtins().unwrap();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_metadata(WRAPPER_NAME_METADATA, "subprocess");
        task.set_metadata(WRAPPER_OPTIONS_METADATA, json!({"executable": "false"}));
        task.add(ctx.crawlers.create("/a/b.exr", None).unwrap(), "/c/d.exr");

        let wrapper = ctx.wrappers.for_task(&task).unwrap();
        assert_matches!(wrapper.run(&task, &ctx), Err(Error::Command { .. }));
    }

    #[test]
    fn task_file_round_trip() {
        let ctx = Context::with_builtins().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut task = ctx.tasks.create("dummy").unwrap();
        let mut crawler = ctx.crawlers.create("/data/SEQ0010/sh_plate.1001.exr", None).unwrap();
        crawler.set_var("artist", "kim", true);
        task.add(crawler, "/out/sh.1001.jpg");

        let task_file = dir.path().join("task.json");
        let result_file = dir.path().join("result.json");
        fs::write(&task_file, task.to_json().unwrap()).unwrap();

        run_task_file(&ctx, &task_file, &result_file).unwrap();
        let outputs = read_result_file(&ctx, &result_file).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].type_name(), "jpg");
        assert_eq!(outputs[0].var("artist").unwrap().to_string(), "kim");
    }
}
