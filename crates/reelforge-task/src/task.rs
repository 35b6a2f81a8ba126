//! The [`Task`] unit of work and the [`TaskKind`] behaviour behind it.

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use reelforge_common::metadata::{get_dotted, set_dotted};
use reelforge_common::{Error, PathHolder, Result, Value};
use reelforge_crawler::{Crawler, CrawlerEnvelope};
use reelforge_template::{is_truthy, Template};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::context::Context;

/// Option naming a template evaluated per crawler; falsy results drop the
/// crawler before the task performs.
pub const FILTER_TEMPLATE_OPTION: &str = "filterTemplate";

/// Option choosing what a task returns when the filter drops every crawler.
pub const EMPTY_FILTER_RESULT_OPTION: &str = "emptyFilterResult";

/// Behaviour of a registered task type.
///
/// Implementations only do the work; option handling, filtering and
/// context-variable propagation are done by [`Task::output`].
pub trait TaskKind: Send + Sync {
    /// Options set on every new task of this type.
    fn default_options(&self) -> Map<String, serde_json::Value> {
        Map::new()
    }

    /// Do the work and return the output crawlers.
    ///
    /// The default writes nothing and reports one crawler per distinct
    /// target path (see [`Task::default_output`]).
    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        task.default_output(ctx)
    }
}

/// What a task returns when its filter removed every crawler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyFilterResult {
    /// Return no crawlers.
    Empty,
    /// Return the unfiltered input crawlers unchanged.
    TaskCrawlers,
}

impl EmptyFilterResult {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "empty" => Ok(Self::Empty),
            "taskCrawlers" => Ok(Self::TaskCrawlers),
            other => Err(Error::config(format!(
                "invalid {EMPTY_FILTER_RESULT_OPTION} {other:?} (expected \"empty\" or \"taskCrawlers\")"
            ))),
        }
    }
}

/// A unit of work bound to an ordered list of `(crawler, target path)`
/// pairs.
#[derive(Clone)]
pub struct Task {
    type_name: String,
    kind: Arc<dyn TaskKind>,
    options: Map<String, serde_json::Value>,
    metadata: Map<String, serde_json::Value>,
    crawlers: Vec<(Crawler, String)>,
    resources: Vec<String>,
}

/// One `crawlerData` entry of the task envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerData {
    /// Target path of the crawler.
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "serializedCrawler")]
    pub serialized_crawler: CrawlerEnvelope,
}

/// Serializable form of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub options: Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: Map<String, serde_json::Value>,
    #[serde(rename = "crawlerData", default)]
    pub crawler_data: Vec<CrawlerData>,
    /// Plugin identifiers that must be loaded before the task is rebuilt.
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Task {
    /// Create a task of a registered kind with the kind's default options.
    pub fn new(type_name: impl Into<String>, kind: Arc<dyn TaskKind>) -> Self {
        let options = kind.default_options();
        Self {
            type_name: type_name.into(),
            kind,
            options,
            metadata: Map::new(),
            crawlers: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Registered type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Associate a crawler with the path it should be written to.
    pub fn add(&mut self, crawler: Crawler, target: impl Into<String>) {
        self.crawlers.push((crawler, target.into()));
    }

    /// The `(crawler, target)` pairs in insertion order.
    pub fn crawlers(&self) -> &[(Crawler, String)] {
        &self.crawlers
    }

    /// Drop every associated crawler.
    pub fn clear_crawlers(&mut self) {
        self.crawlers.clear();
    }

    /// Replace the associated crawlers.
    pub fn set_crawlers(&mut self, crawlers: Vec<(Crawler, String)>) {
        self.crawlers = crawlers;
    }

    /// Distinct target paths in first-seen order.
    pub fn target_paths(&self) -> Vec<String> {
        let targets: IndexSet<&str> = self.crawlers.iter().map(|(_, t)| t.as_str()).collect();
        targets.into_iter().map(str::to_string).collect()
    }

    /// Look up an option.
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options.get(name)
    }

    /// Set an option.
    pub fn set_option(&mut self, name: &str, value: impl Into<serde_json::Value>) {
        self.options.insert(name.to_string(), value.into());
    }

    /// Option names in insertion order.
    pub fn option_names(&self) -> Vec<String> {
        self.options.keys().cloned().collect()
    }

    /// A string option, erroring when it is missing or not a string.
    pub fn str_option(&self, name: &str) -> Result<&str> {
        self.options
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::config(format!("task {} needs string option {name:?}", self.type_name)))
    }

    /// Resolve a string option as a template against `crawler`.
    pub fn template_option(&self, name: &str, crawler: &Crawler, ctx: &Context) -> Result<String> {
        self.template_option_with(name, crawler, &IndexMap::new(), ctx)
    }

    /// Like [`Task::template_option`], with additional variables.
    pub fn template_option_with(
        &self,
        name: &str,
        crawler: &Crawler,
        extra: &IndexMap<String, Value>,
        ctx: &Context,
    ) -> Result<String> {
        let raw = self.str_option(name)?;
        Template::new(raw, Arc::clone(&ctx.functions))?.value_from_crawler(crawler, extra)
    }

    /// Look up `a.b.c` in the metadata.
    pub fn metadata(&self, path: &str) -> Option<&serde_json::Value> {
        get_dotted(&self.metadata, path)
    }

    /// Set `a.b.c` in the metadata.
    pub fn set_metadata(&mut self, path: &str, value: impl Into<serde_json::Value>) {
        set_dotted(&mut self.metadata, path, value.into());
    }

    /// The whole metadata tree.
    pub fn metadata_map(&self) -> &Map<String, serde_json::Value> {
        &self.metadata
    }

    /// A boolean metadata flag; missing means `false`.
    pub fn metadata_flag(&self, path: &str) -> bool {
        match self.metadata(path) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(other) => Value::from_json(other).as_bool().unwrap_or(false),
            None => false,
        }
    }

    /// Plugin identifiers needed to rebuild this task in another process.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Record a plugin identifier needed by this task.
    pub fn add_resource(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.resources.contains(&id) {
            self.resources.push(id);
        }
    }

    /// Run the task and return its output crawlers.
    ///
    /// Applies the `filterTemplate` / `emptyFilterResult` options, calls the
    /// kind's `perform`, then copies context variables from the inputs onto
    /// the outputs: each output receives them from the inputs targeting its
    /// path, or from every input when none does.
    pub fn output(&self, ctx: &Context) -> Result<Vec<Crawler>> {
        let mut view = self.clone();
        if let Some(filter) = self.option(FILTER_TEMPLATE_OPTION).and_then(|v| v.as_str()) {
            let policy = match self.option(EMPTY_FILTER_RESULT_OPTION) {
                Some(value) => EmptyFilterResult::parse(value.as_str().unwrap_or_default())?,
                None => EmptyFilterResult::Empty,
            };

            let template = Template::new(filter, Arc::clone(&ctx.functions))?;
            let mut kept = Vec::new();
            for (crawler, target) in &self.crawlers {
                if is_truthy(&template.value_from_crawler(crawler, &IndexMap::new())?) {
                    kept.push((crawler.clone(), target.clone()));
                }
            }

            if kept.is_empty() && !self.crawlers.is_empty() {
                tracing::debug!("Filter {filter:?} removed every crawler of task {}", self.type_name);
                return Ok(match policy {
                    EmptyFilterResult::Empty => Vec::new(),
                    EmptyFilterResult::TaskCrawlers => {
                        self.crawlers.iter().map(|(c, _)| c.clone()).collect()
                    }
                });
            }
            view.crawlers = kept;
        }

        tracing::info!(
            "Running task {} on {} crawler(s)",
            self.type_name,
            view.crawlers.len()
        );
        let mut outputs = self.kind.perform(&view, ctx)?;
        view.propagate_context_vars(&mut outputs);
        Ok(outputs)
    }

    /// One freshly created crawler per distinct target path, in first-seen
    /// order.
    pub fn default_output(&self, ctx: &Context) -> Result<Vec<Crawler>> {
        self.target_paths()
            .into_iter()
            .map(|target| ctx.crawlers.create(PathHolder::new(target), None))
            .collect()
    }

    fn propagate_context_vars(&self, outputs: &mut [Crawler]) {
        for output in outputs.iter_mut() {
            let path = output.file_path();
            let mut sources: Vec<&Crawler> = self
                .crawlers
                .iter()
                .filter(|(_, target)| PathHolder::new(target.as_str()).as_str() == path)
                .map(|(c, _)| c)
                .collect();
            if sources.is_empty() {
                sources = self.crawlers.iter().map(|(c, _)| c).collect();
            }

            for source in sources {
                for name in source.context_var_names() {
                    if let Ok(value) = source.var(&name) {
                        output.set_var(&name, value.clone(), true);
                    }
                }
            }
        }
    }

    /// The serializable envelope.
    pub fn to_envelope(&self) -> TaskEnvelope {
        TaskEnvelope {
            type_name: self.type_name.clone(),
            options: self.options.clone(),
            metadata: self.metadata.clone(),
            crawler_data: self
                .crawlers
                .iter()
                .map(|(crawler, target)| CrawlerData {
                    file_path: target.clone(),
                    serialized_crawler: crawler.to_envelope(),
                })
                .collect(),
            resources: self.resources.clone(),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_envelope())?)
    }

    /// Rebuild a task, loading its plugin resources first.
    pub fn from_envelope(ctx: &Context, envelope: TaskEnvelope) -> Result<Self> {
        ctx.ensure_plugins(&envelope.resources)?;

        let mut task = ctx.tasks.create(&envelope.type_name)?;
        task.options.extend(envelope.options);
        task.metadata = envelope.metadata;
        task.resources = envelope.resources;
        for data in envelope.crawler_data {
            let crawler = Crawler::from_envelope(&ctx.crawlers, data.serialized_crawler)?;
            task.add(crawler, data.file_path);
        }
        Ok(task)
    }

    /// Rebuild a task from a JSON string.
    pub fn from_json(ctx: &Context, json: &str) -> Result<Self> {
        let envelope: TaskEnvelope = serde_json::from_str(json)?;
        Self::from_envelope(ctx, envelope)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("type", &self.type_name)
            .field("options", &self.options)
            .field("metadata", &self.metadata)
            .field("crawlers", &self.crawlers.len())
            .field("resources", &self.resources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn ctx() -> Context {
        Context::with_builtins().unwrap()
    }

    fn plate(frame: u32) -> Crawler {
        let ctx = ctx();
        let mut crawler = ctx
            .crawlers
            .create(format!("/data/SEQ0010/shot_010_plate.{frame}.exr").as_str(), None)
            .unwrap();
        crawler.set_var("note", "not context", false);
        crawler
    }

    #[test]
    fn default_output_is_one_crawler_per_target() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.add(plate(1001), "/out/a.mov");
        task.add(plate(1002), "/out/a.mov");
        task.add(plate(1003), "/out/b.mov");

        let outputs = task.output(&ctx).unwrap();
        let paths: Vec<String> = outputs.iter().map(Crawler::file_path).collect();
        assert_eq!(paths, vec!["/out/a.mov", "/out/b.mov"]);
        for output in &outputs {
            assert_eq!(output.type_name(), "video");
            assert_eq!(output.var("shot").unwrap(), &Value::from("shot_010"));
            assert!(output.is_context_var("shot"));
            assert!(!output.has_var("note"));
        }
    }

    #[test]
    fn filter_template_drops_crawlers() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_option(FILTER_TEMPLATE_OPTION, "(ne {frame} 1002)");
        task.add(plate(1001), "/out/a.1001.exr");
        task.add(plate(1002), "/out/a.1002.exr");

        let outputs = task.output(&ctx).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].file_path(), "/out/a.1001.exr");
    }

    #[test]
    fn empty_filter_result_policies() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_option(FILTER_TEMPLATE_OPTION, "0");
        task.add(plate(1001), "/out/a.1001.exr");
        assert!(task.output(&ctx).unwrap().is_empty());

        task.set_option(EMPTY_FILTER_RESULT_OPTION, "taskCrawlers");
        let outputs = task.output(&ctx).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].file_path(), "/data/SEQ0010/shot_010_plate.1001.exr");

        task.set_option(EMPTY_FILTER_RESULT_OPTION, "everything");
        assert_matches!(task.output(&ctx), Err(Error::Config(_)));
    }

    #[test]
    fn metadata_uses_dotted_paths() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_metadata("dispatch.split", true);
        task.set_metadata("dispatch.splitSize", 10);
        assert!(task.metadata_flag("dispatch.split"));
        assert!(!task.metadata_flag("dispatch.await"));
        assert_eq!(task.metadata("dispatch.splitSize"), Some(&json!(10)));
        assert_eq!(task.metadata_map()["dispatch"], json!({"split": true, "splitSize": 10}));
    }

    #[test]
    fn json_round_trip() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("copy").unwrap();
        task.set_option("custom", "x");
        task.set_metadata("wrapper.name", "default");
        task.add(plate(1001), "/out/a.1001.exr");
        task.add(plate(1002), "/out/a.1002.exr");

        let restored = Task::from_json(&ctx, &task.to_json().unwrap()).unwrap();
        assert_eq!(restored.type_name(), "copy");
        assert_eq!(restored.option("custom"), Some(&json!("x")));
        assert_eq!(restored.metadata("wrapper.name"), Some(&json!("default")));
        assert_eq!(restored.target_paths(), task.target_paths());
        assert_eq!(
            restored.crawlers()[1].0.var("frame").unwrap(),
            &Value::from(1002)
        );
    }

    #[test]
    fn json_requires_known_resources() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.add_resource("studioTools");
        assert_matches!(
            Task::from_json(&ctx, &task.to_json().unwrap()),
            Err(Error::TypeNotFound { kind, .. }) if kind == "plugin"
        );
    }

    #[test]
    fn template_option_resolves_against_crawler() {
        let ctx = ctx();
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_option("label", "{shot}_(pad {frame} 5)");
        assert_eq!(
            task.template_option("label", &plate(1001), &ctx).unwrap(),
            "shot_010_01001"
        );
        assert_matches!(
            task.template_option("missing", &plate(1001), &ctx),
            Err(Error::Config(_))
        );
    }
}
