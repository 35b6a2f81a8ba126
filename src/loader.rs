//! Pipeline configuration loading.
//!
//! A pipeline is a JSON file (or a directory of them) describing task
//! holder trees:
//!
//! ```json
//! {
//!   "vars": { "publishRoot": "/jobs/show/publish" },
//!   "contextVars": { "dept": "comp" },
//!   "scripts": ["reelforge.sequence"],
//!   "taskHolders": [
//!     {
//!       "task": "copy",
//!       "targetTemplate": "{publishRoot}/{seq}/{baseName}",
//!       "matchTypes": ["exrPlate"],
//!       "matchVars": { "shot": ["shot_0*"] },
//!       "taskOptions": {},
//!       "taskMetadata": { "dispatch.split": true },
//!       "taskHolders": [{ "includeTaskHolder": "verify.json" }]
//!     }
//!   ]
//! }
//! ```
//!
//! File-level `vars`/`contextVars` apply to every holder of the file and of
//! the files it includes; a holder's own `vars` override them. `scripts`
//! are plugin identifiers, loaded before any task is created and recorded
//! as task resources. Include paths are relative to the including file.

use anyhow::{Context as _, Result};
use indexmap::{IndexMap, IndexSet};
use reelforge_common::Value;
use reelforge_task::{Context, CrawlerMatcher, TaskHolder};
use serde::Deserialize;
use serde_json::Map;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineFile {
    #[serde(default)]
    vars: IndexMap<String, Value>,
    #[serde(default)]
    context_vars: IndexMap<String, Value>,
    #[serde(default)]
    scripts: Vec<String>,
    #[serde(default)]
    task_holders: Vec<HolderEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HolderEntry {
    Include {
        #[serde(rename = "includeTaskHolder")]
        include_task_holder: PathBuf,
    },
    Holder(Box<HolderSpec>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HolderSpec {
    task: String,
    target_template: String,
    #[serde(default)]
    match_types: Vec<String>,
    #[serde(default)]
    match_vars: IndexMap<String, Value>,
    #[serde(default)]
    task_options: Map<String, serde_json::Value>,
    #[serde(default)]
    task_metadata: Map<String, serde_json::Value>,
    #[serde(default)]
    vars: IndexMap<String, Value>,
    #[serde(default)]
    context_vars: IndexMap<String, Value>,
    #[serde(default)]
    task_holders: Vec<HolderEntry>,
}

/// Variables and resources in effect while building a file's holders.
#[derive(Debug, Clone, Default)]
struct Scope {
    vars: IndexMap<String, (Value, bool)>,
    resources: Vec<String>,
}

impl Scope {
    fn extend(&self, file: &PipelineFile) -> Scope {
        let mut scope = self.clone();
        for (name, value) in &file.vars {
            scope.vars.insert(name.clone(), (value.clone(), false));
        }
        for (name, value) in &file.context_vars {
            scope.vars.insert(name.clone(), (value.clone(), true));
        }
        for script in &file.scripts {
            if !scope.resources.contains(script) {
                scope.resources.push(script.clone());
            }
        }
        scope
    }
}

/// Builds [`TaskHolder`] trees from pipeline files.
pub struct PipelineLoader<'a> {
    ctx: &'a Context,
    stack: Vec<PathBuf>,
    included: IndexSet<PathBuf>,
}

impl<'a> PipelineLoader<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            included: IndexSet::new(),
        }
    }

    /// Load a pipeline file, or every `*.json` file below a directory.
    ///
    /// In a directory, files pulled in through `includeTaskHolder` are not
    /// loaded a second time as top-level pipelines.
    pub fn load(&mut self, path: &Path) -> Result<Vec<TaskHolder>> {
        if !path.is_dir() {
            return self.load_file(path);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to scan {:?}", path))?;
            let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
            if entry.file_type().is_file() && is_json {
                let canonical = canonical(entry.path())?;
                let holders = self.load_file(&canonical)?;
                files.push((canonical, holders));
            }
        }

        let holders: Vec<TaskHolder> = files
            .into_iter()
            .filter(|(file, _)| !self.included.contains(file))
            .flat_map(|(_, holders)| holders)
            .collect();
        tracing::info!("Loaded {} task holder(s) from {:?}", holders.len(), path);
        Ok(holders)
    }

    /// Load the top-level holders of one pipeline file.
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<TaskHolder>> {
        self.load_scoped(path, &Scope::default())
    }

    fn load_scoped(&mut self, path: &Path, parent: &Scope) -> Result<Vec<TaskHolder>> {
        let path = canonical(path)?;
        if self.stack.contains(&path) {
            anyhow::bail!("Include cycle through {:?}", path);
        }

        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read pipeline: {:?}", path))?;
        let file: PipelineFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse pipeline: {:?}", path))?;

        self.ctx
            .ensure_plugins(&file.scripts)
            .with_context(|| format!("Failed to load scripts of {:?}", path))?;

        let scope = parent.extend(&file);
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        self.stack.push(path.clone());
        let holders = self.build_entries(&file.task_holders, &base_dir, &scope);
        self.stack.pop();

        let holders = holders.with_context(|| format!("Invalid pipeline: {:?}", path))?;
        tracing::debug!("{:?}: {} task holder(s)", path, holders.len());
        Ok(holders)
    }

    fn build_entries(&mut self, entries: &[HolderEntry], base_dir: &Path, scope: &Scope) -> Result<Vec<TaskHolder>> {
        let mut holders = Vec::new();
        for entry in entries {
            match entry {
                HolderEntry::Include { include_task_holder } => {
                    let target = base_dir.join(include_task_holder);
                    let included = self.load_scoped(&target, scope)?;
                    self.included.insert(canonical(&target)?);
                    holders.extend(included);
                }
                HolderEntry::Holder(spec) => holders.push(self.build_holder(spec, base_dir, scope)?),
            }
        }
        Ok(holders)
    }

    fn build_holder(&mut self, spec: &HolderSpec, base_dir: &Path, scope: &Scope) -> Result<TaskHolder> {
        let mut task = self
            .ctx
            .tasks
            .create(&spec.task)
            .with_context(|| format!("Unknown task '{}'", spec.task))?;
        for (name, value) in &spec.task_options {
            task.set_option(name, value.clone());
        }
        for (name, value) in &spec.task_metadata {
            task.set_metadata(name, value.clone());
        }
        for resource in &scope.resources {
            task.add_resource(resource.as_str());
        }

        let matcher = CrawlerMatcher::from_values(spec.match_types.clone(), &spec.match_vars);
        let mut holder = TaskHolder::new(task, spec.target_template.as_str(), matcher);

        for (name, (value, is_context)) in &scope.vars {
            holder.add_var(name, value.clone(), *is_context);
        }
        for (name, value) in &spec.vars {
            holder.add_var(name, value.clone(), false);
        }
        for (name, value) in &spec.context_vars {
            holder.add_var(name, value.clone(), true);
        }

        for sub in self.build_entries(&spec.task_holders, base_dir, scope)? {
            holder.add_sub_holder(sub);
        }
        Ok(holder)
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Pipeline file not found: {:?}", path))
}

/// Load a pipeline file or directory.
pub fn load_pipeline(ctx: &Context, path: &Path) -> Result<Vec<TaskHolder>> {
    PipelineLoader::new(ctx).load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, json: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
        path
    }

    #[test]
    fn holder_tree_with_vars_options_and_metadata() {
        let ctx = Context::with_builtins().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "publish.json",
            serde_json::json!({
                "vars": { "root": "/publish" },
                "contextVars": { "dept": "comp" },
                "taskHolders": [{
                    "task": "copy",
                    "targetTemplate": "{root}/{baseName}",
                    "matchTypes": ["exrPlate"],
                    "matchVars": { "shot": "shot_0*" },
                    "taskMetadata": { "dispatch.split": true },
                    "vars": { "root": "/override" },
                    "taskHolders": [{
                        "task": "checksum",
                        "targetTemplate": "{filePath}",
                        "taskOptions": { "filterTemplate": "{verify}" }
                    }]
                }]
            }),
        );

        let holders = load_pipeline(&ctx, &file).unwrap();
        assert_eq!(holders.len(), 1);
        let copy = &holders[0];
        assert_eq!(copy.task().type_name(), "copy");
        assert_eq!(copy.var("root").unwrap(), &Value::from("/override"));
        assert_eq!(copy.context_var_names(), vec!["dept"]);
        assert_eq!(copy.matcher().match_types(), ["exrPlate"]);
        assert!(copy.task().metadata_flag("dispatch.split"));

        let verify = &copy.sub_holders()[0];
        assert_eq!(verify.task().type_name(), "checksum");
        assert_eq!(verify.var("root").unwrap(), &Value::from("/publish"));
        assert_eq!(
            verify.task().option("filterTemplate"),
            Some(&serde_json::json!("{verify}"))
        );
    }

    #[test]
    fn included_files_are_not_top_level() {
        let ctx = Context::with_builtins().unwrap();
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a_main.json",
            serde_json::json!({
                "vars": { "show": "demo" },
                "taskHolders": [{ "includeTaskHolder": "shared/verify.json" }]
            }),
        );
        write(
            dir.path(),
            "shared/verify.json",
            serde_json::json!({
                "taskHolders": [{ "task": "checksum", "targetTemplate": "{filePath}" }]
            }),
        );
        write(
            dir.path(),
            "z_other.json",
            serde_json::json!({
                "taskHolders": [{ "task": "dummy", "targetTemplate": "/tmp/{name}" }]
            }),
        );

        let holders = load_pipeline(&ctx, dir.path()).unwrap();
        let types: Vec<&str> = holders.iter().map(|h| h.task().type_name()).collect();
        assert_eq!(types, vec!["checksum", "dummy"]);
        assert_eq!(holders[0].var("show").unwrap(), &Value::from("demo"));
    }

    #[test]
    fn include_cycle_is_an_error() {
        let ctx = Context::with_builtins().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.json",
            serde_json::json!({ "taskHolders": [{ "includeTaskHolder": "b.json" }] }),
        );
        write(
            dir.path(),
            "b.json",
            serde_json::json!({ "taskHolders": [{ "includeTaskHolder": "a.json" }] }),
        );

        let err = load_pipeline(&ctx, &a).unwrap_err();
        assert!(format!("{err:#}").contains("Include cycle"));
    }

    #[test]
    fn unknown_task_and_script_fail() {
        let ctx = Context::with_builtins().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let bad_task = write(
            dir.path(),
            "task.json",
            serde_json::json!({ "taskHolders": [{ "task": "render", "targetTemplate": "x" }] }),
        );
        assert!(load_pipeline(&ctx, &bad_task).is_err());

        let bad_script = write(dir.path(), "script.json", serde_json::json!({ "scripts": ["nope"] }));
        let err = load_pipeline(&ctx, &bad_script).unwrap_err();
        assert!(format!("{err:#}").contains("plugin type not found: nope"));
    }

    #[test]
    fn scripts_become_task_resources() {
        let ctx = crate::plugins::build_context::<&str>(&[]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "manifest.json",
            serde_json::json!({
                "scripts": [crate::plugins::MANIFEST_PLUGIN],
                "taskHolders": [{ "task": "manifest", "targetTemplate": "/tmp/{name}.json" }]
            }),
        );

        let holders = load_pipeline(&ctx, &file).unwrap();
        assert_eq!(holders[0].task().resources(), [crate::plugins::MANIFEST_PLUGIN]);
    }
}
