//! The [`TaskHolder`] execution tree.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use reelforge_common::{Error, Result, Value};
use reelforge_crawler::Crawler;
use reelforge_template::Template;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::matcher::CrawlerMatcher;
use crate::query::CrawlerQuery;
use crate::task::{Task, TaskEnvelope};

/// Binds a task to a matching rule and a target path template, with
/// nested holders fed by the task's output.
#[derive(Debug, Clone)]
pub struct TaskHolder {
    task: Task,
    target_template: String,
    matcher: CrawlerMatcher,
    sub_holders: Vec<TaskHolder>,
    vars: IndexMap<String, Value>,
    context_var_names: IndexSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateEnvelope {
    pub target: String,
}

/// Serializable form of a holder tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHolderEnvelope {
    pub template: TemplateEnvelope,
    #[serde(default)]
    pub matcher: CrawlerMatcher,
    #[serde(default)]
    pub vars: IndexMap<String, Value>,
    #[serde(rename = "contextVarNames", default)]
    pub context_var_names: Vec<String>,
    pub task: TaskEnvelope,
    #[serde(rename = "subTaskHolders", default)]
    pub sub_task_holders: Vec<TaskHolderEnvelope>,
}

impl TaskHolder {
    /// Create a holder. The task is owned; pass a clone to share a
    /// configured task between holders.
    pub fn new(task: Task, target_template: impl Into<String>, matcher: CrawlerMatcher) -> Self {
        Self {
            task,
            target_template: target_template.into(),
            matcher,
            sub_holders: Vec::new(),
            vars: IndexMap::new(),
            context_var_names: IndexSet::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut Task {
        &mut self.task
    }

    /// Raw target template string.
    pub fn target_template(&self) -> &str {
        &self.target_template
    }

    pub fn matcher(&self) -> &CrawlerMatcher {
        &self.matcher
    }

    /// Add a nested holder.
    pub fn add_sub_holder(&mut self, holder: TaskHolder) {
        self.sub_holders.push(holder);
    }

    pub fn sub_holders(&self) -> &[TaskHolder] {
        &self.sub_holders
    }

    /// A copy of this holder without nested holders.
    pub fn without_sub_holders(&self) -> TaskHolder {
        TaskHolder {
            sub_holders: Vec::new(),
            ..self.clone()
        }
    }

    /// Set a holder variable, stamped onto every matched crawler.
    pub fn add_var(&mut self, name: &str, value: impl Into<Value>, is_context: bool) {
        self.vars.insert(name.to_string(), value.into());
        if is_context {
            self.context_var_names.insert(name.to_string());
        } else {
            self.context_var_names.shift_remove(name);
        }
    }

    /// Look up a holder variable.
    pub fn var(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| Error::InvalidVar(name.to_string()))
    }

    pub fn var_names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    pub fn context_var_names(&self) -> Vec<String> {
        self.context_var_names.iter().cloned().collect()
    }

    /// Match `crawlers` and return a copy of the task populated with the
    /// matches, holder variables stamped on each.
    pub fn populate(&self, ctx: &Context, crawlers: &[Crawler]) -> Result<Task> {
        let template = Template::new(self.target_template.as_str(), Arc::clone(&ctx.functions))?;
        let matches = CrawlerQuery::new(&template, &self.matcher).query(crawlers, &self.vars, &ctx.crawlers)?;

        let mut task = self.task.clone();
        task.clear_crawlers();
        for (mut crawler, target) in matches {
            for (name, value) in &self.vars {
                crawler.set_var(name, value.clone(), self.context_var_names.contains(name));
            }
            task.add(crawler, target);
        }
        Ok(task)
    }

    /// Run an already populated task through its wrapper.
    pub fn execute(&self, ctx: &Context, task: &Task) -> Result<Vec<Crawler>> {
        let wrapper = ctx.wrappers.for_task(task)?;
        wrapper.run(task, ctx)
    }

    /// Run this holder on `crawlers`, then every nested holder on the
    /// task's output. Returns this holder's task output.
    ///
    /// No matching crawler is not an error: nothing runs and the result is
    /// empty.
    pub fn run(&self, ctx: &Context, crawlers: &[Crawler]) -> Result<Vec<Crawler>> {
        let task = self.populate(ctx, crawlers)?;
        if task.crawlers().is_empty() {
            tracing::debug!("Task {} matched no crawlers", task.type_name());
            return Ok(Vec::new());
        }

        let outputs = self.execute(ctx, &task)?;
        for sub in &self.sub_holders {
            sub.run(ctx, &outputs)?;
        }
        Ok(outputs)
    }

    /// The serializable envelope of the whole tree.
    pub fn to_envelope(&self) -> TaskHolderEnvelope {
        TaskHolderEnvelope {
            template: TemplateEnvelope {
                target: self.target_template.clone(),
            },
            matcher: self.matcher.clone(),
            vars: self.vars.clone(),
            context_var_names: self.context_var_names(),
            task: self.task.to_envelope(),
            sub_task_holders: self.sub_holders.iter().map(TaskHolder::to_envelope).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_envelope())?)
    }

    /// Rebuild a holder tree.
    pub fn from_envelope(ctx: &Context, envelope: TaskHolderEnvelope) -> Result<Self> {
        let task = Task::from_envelope(ctx, envelope.task)?;
        let mut holder = TaskHolder::new(task, envelope.template.target, envelope.matcher);
        holder.vars = envelope.vars;
        holder.context_var_names = envelope.context_var_names.into_iter().collect();
        for sub in envelope.sub_task_holders {
            holder.add_sub_holder(TaskHolder::from_envelope(ctx, sub)?);
        }
        Ok(holder)
    }

    pub fn from_json(ctx: &Context, json: &str) -> Result<Self> {
        let envelope: TaskHolderEnvelope = serde_json::from_str(json)?;
        Self::from_envelope(ctx, envelope)
    }
}
