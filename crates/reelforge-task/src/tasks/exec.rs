use std::process::Command;
use std::sync::Arc;

use indexmap::IndexMap;
use reelforge_common::{Error, Result, Value};
use reelforge_crawler::Crawler;
use reelforge_template::Template;
use serde_json::{json, Map};

use crate::context::Context;
use crate::task::{Task, TaskKind};

/// Runs an external command once per crawler.
///
/// Options:
/// - `command`: program, resolved as a template.
/// - `args`: list of arguments, each resolved as a template.
///
/// Both see the crawler's variables plus `{input}` (the crawler's path)
/// and `{output}` (its target path).
pub struct ExecTask;

impl TaskKind for ExecTask {
    fn default_options(&self) -> Map<String, serde_json::Value> {
        let mut options = Map::new();
        options.insert("args".into(), json!([]));
        options
    }

    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        let arg_templates = task
            .option("args")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => Value::from_json(other).to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let arg_templates = arg_templates
            .iter()
            .map(|raw| Template::new(raw.as_str(), Arc::clone(&ctx.functions)))
            .collect::<Result<Vec<_>>>()?;

        for (crawler, target) in task.crawlers() {
            let mut extra = IndexMap::new();
            extra.insert("input".to_string(), Value::from(crawler.file_path()));
            extra.insert("output".to_string(), Value::from(target.as_str()));

            let program = task.template_option_with("command", crawler, &extra, ctx)?;
            let args = arg_templates
                .iter()
                .map(|t| t.value_from_crawler(crawler, &extra))
                .collect::<Result<Vec<_>>>()?;
            run_command(&program, &args)?;
        }
        task.default_output(ctx)
    }
}

fn run_command(program: &str, args: &[String]) -> Result<()> {
    let resolved = which::which(program).unwrap_or_else(|_| program.into());
    tracing::info!("exec: {} {}", resolved.display(), args.join(" "));

    let output = Command::new(&resolved).args(args).output()?;
    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stderr).to_string();
        if text.trim().is_empty() {
            text = String::from_utf8_lossy(&output.stdout).to_string();
        }
        return Err(Error::command(program, output.status.code(), text.trim()));
    }
    Ok(())
}
