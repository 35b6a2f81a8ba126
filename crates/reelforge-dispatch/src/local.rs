//! Hand-off of a holder tree to a local child process.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use reelforge_common::{Error, Result};
use reelforge_crawler::{Crawler, CrawlerEnvelope};
use reelforge_task::{Context, TaskHolder, TaskHolderEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::dispatcher::{bool_option, str_option, Dispatcher};

/// Waiter threads of fire-and-forget children.
static RUNNING: LazyLock<Mutex<Vec<JoinHandle<()>>>> = LazyLock::new(|| Mutex::new(Vec::new()));

/// The file handed to `exec-holder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalJob {
    #[serde(rename = "taskHolder")]
    pub task_holder: TaskHolderEnvelope,
    pub crawlers: Vec<CrawlerEnvelope>,
}

/// Runs the holder tree in `<executable> exec-holder <job file>`.
///
/// Options:
/// - `awaitExecution` (default `false`): block until the child exits and
///   fail on a non-zero status. Otherwise a background thread reaps it.
/// - `executable`: defaults to the current executable.
/// - `jobDirectory`: where job files go, defaults to the temp directory.
pub struct LocalDispatcher {
    options: Map<String, serde_json::Value>,
    executable: PathBuf,
    job_directory: PathBuf,
    await_execution: bool,
}

impl LocalDispatcher {
    pub fn from_options(options: &Map<String, serde_json::Value>) -> Result<Self> {
        let executable = match str_option(options, "executable") {
            Some(path) => PathBuf::from(path),
            None => std::env::current_exe()?,
        };
        let job_directory = str_option(options, "jobDirectory")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("reelforge-local"));
        Ok(Self {
            options: options.clone(),
            executable,
            job_directory,
            await_execution: bool_option(options, "awaitExecution", false),
        })
    }

    fn write_job(&self, holder: &TaskHolder, crawlers: &[Crawler]) -> Result<PathBuf> {
        let dir = self.job_directory.join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&dir)?;
        let job = LocalJob {
            task_holder: holder.to_envelope(),
            crawlers: crawlers.iter().map(Crawler::to_envelope).collect(),
        };
        let path = dir.join("job.json");
        fs::write(&path, serde_json::to_string_pretty(&job)?)?;
        Ok(path)
    }
}

impl Dispatcher for LocalDispatcher {
    fn type_name(&self) -> &str {
        "local"
    }

    fn options(&self) -> &Map<String, serde_json::Value> {
        &self.options
    }

    fn dispatch(&self, _ctx: &Context, holder: &TaskHolder, crawlers: &[Crawler]) -> Result<Vec<String>> {
        prune_finished();

        let job_file = self.write_job(holder, crawlers)?;
        tracing::info!(
            "Dispatching task {} locally ({})",
            holder.task().type_name(),
            job_file.display()
        );

        let mut command = Command::new(&self.executable);
        command.arg("exec-holder").arg(&job_file);

        if self.await_execution {
            let output = command.output()?;
            if !output.status.success() {
                return Err(Error::command(
                    self.executable.display().to_string(),
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim(),
                ));
            }
            return Ok(vec![job_file.display().to_string()]);
        }

        let child = command.spawn()?;
        let id = child.id().to_string();
        RUNNING.lock().push(thread::spawn(move || reap(child)));
        Ok(vec![id])
    }
}

fn reap(mut child: Child) {
    let id = child.id();
    match child.wait() {
        Ok(status) if status.success() => tracing::debug!("Local job {id} finished"),
        Ok(status) => tracing::error!("Local job {id} failed: {status}"),
        Err(e) => tracing::error!("Local job {id} could not be waited on: {e}"),
    }
}

fn prune_finished() {
    RUNNING.lock().retain(|handle| !handle.is_finished());
}

/// Number of fire-and-forget children still running.
pub fn running_jobs() -> usize {
    prune_finished();
    RUNNING.lock().len()
}

/// Block until every fire-and-forget child has exited.
pub fn wait_for_running_jobs() {
    let handles: Vec<JoinHandle<()>> = RUNNING.lock().drain(..).collect();
    for handle in handles {
        if handle.join().is_err() {
            tracing::error!("A local job waiter panicked");
        }
    }
}

/// Entry point of `exec-holder`: run the holder tree in this process.
pub fn run_local_job(ctx: &Context, job_file: &Path) -> Result<Vec<Crawler>> {
    let job: LocalJob = serde_json::from_str(&fs::read_to_string(job_file)?)?;
    let holder = TaskHolder::from_envelope(ctx, job.task_holder)?;
    let crawlers = job
        .crawlers
        .into_iter()
        .map(|envelope| Crawler::from_envelope(&ctx.crawlers, envelope))
        .collect::<Result<Vec<_>>>()?;
    holder.run(ctx, &crawlers)
}
