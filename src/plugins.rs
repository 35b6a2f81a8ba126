//! Compiled-in plugins.
//!
//! A pipeline names the plugins it needs in its `scripts` list; they are
//! loaded into the shared [`Context`] on demand and recorded as task
//! resources, so a subprocess or farm node rebuilding the task loads them
//! too.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use reelforge_common::paths::parse_sequence_name;
use reelforge_common::{Error, PathHolder, Result};
use reelforge_crawler::Crawler;
use reelforge_task::{Context, PluginCatalog, Task, TaskKind};
use serde_json::json;

/// Sequence helpers: the `seqpattern` and `framerange` template functions.
pub const SEQUENCE_PLUGIN: &str = "reelforge.sequence";

/// The `manifest` task.
pub const MANIFEST_PLUGIN: &str = "reelforge.manifest";

/// Make every compiled-in plugin available on `catalog`.
pub fn register_catalog(catalog: &PluginCatalog) {
    catalog.register(SEQUENCE_PLUGIN, load_sequence);
    catalog.register(MANIFEST_PLUGIN, load_manifest);
}

/// A context with the built-ins, the plugin catalog, and `load` loaded.
pub fn build_context<S: AsRef<str>>(load: &[S]) -> Result<Context> {
    let ctx = Context::with_builtins()?;
    register_catalog(&ctx.plugins);
    ctx.ensure_plugins(load)?;
    Ok(ctx)
}

fn load_sequence(ctx: &Context) -> Result<()> {
    ctx.functions.register("seqpattern", |args| {
        let path = args
            .first()
            .ok_or_else(|| Error::template_function("seqpattern", "expected a file path"))?;
        let marker = args.get(1).copied().unwrap_or("#");
        Ok(sequence_pattern(path, marker))
    });
    ctx.functions.register("framerange", |args| {
        let dir = args
            .first()
            .ok_or_else(|| Error::template_function("framerange", "expected a directory"))?;
        frame_range(Path::new(dir))
    });
    Ok(())
}

/// `/a/plate.1001.exr` -> `/a/plate.####.exr`. Paths that are not
/// sequence members come back unchanged.
pub fn sequence_pattern(path: &str, marker: &str) -> String {
    let holder = PathHolder::new(path);
    match parse_sequence_name(&holder.base_name()) {
        Some(seq) => {
            let name = format!("{}.{}.{}", seq.name, marker.repeat(seq.padding), seq.ext);
            match holder.dir_name() {
                dir if dir.is_empty() => name,
                dir => PathHolder::new(dir).join(&name).to_string(),
            }
        }
        None => path.to_string(),
    }
}

/// `first-last` over the sequence members in `dir`, empty when there are
/// none.
fn frame_range(dir: &Path) -> Result<String> {
    let mut frames: Vec<i64> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_sequence_name(&entry.file_name().to_string_lossy()))
            .map(|seq| seq.frame)
            .collect(),
        Err(_) => return Ok(String::new()),
    };
    frames.sort_unstable();
    Ok(match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => format!("{first}-{last}"),
        _ => String::new(),
    })
}

fn load_manifest(ctx: &Context) -> Result<()> {
    ctx.tasks.register("manifest", Arc::new(ManifestTask));
    Ok(())
}

/// Writes one JSON manifest per target listing the sources that map to it
/// and their variables.
///
/// Option `indent` (bool, default true) selects pretty printing.
pub struct ManifestTask;

impl TaskKind for ManifestTask {
    fn default_options(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut options = serde_json::Map::new();
        options.insert("indent".into(), json!(true));
        options
    }

    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        let pretty = task.option("indent").and_then(|v| v.as_bool()).unwrap_or(true);
        for target in task.target_paths() {
            let entries: Vec<serde_json::Value> = task
                .crawlers()
                .iter()
                .filter(|(_, t)| *t == target)
                .map(|(crawler, _)| {
                    let vars: serde_json::Map<String, serde_json::Value> = crawler
                        .vars()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect();
                    json!({ "filePath": crawler.file_path(), "vars": vars })
                })
                .collect();

            let target = Path::new(&target);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = if pretty {
                serde_json::to_string_pretty(&entries)?
            } else {
                serde_json::to_string(&entries)?
            };
            fs::write(target, content)?;
            tracing::info!("Wrote manifest {} ({} entries)", target.display(), entries.len());
        }
        task.default_output(ctx)
    }
}
