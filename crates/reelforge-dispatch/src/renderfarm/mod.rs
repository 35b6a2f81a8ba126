//! Render farm dispatch: expanded chunk jobs and collapsed follow-up jobs.
//!
//! Dispatching a holder:
//!
//! 1. With `expandOnTheFarm`, the whole holder and its crawlers become one
//!    collapsed job; the farm node does the expansion below.
//! 2. Otherwise the holder's task is populated, split into chunks
//!    (`dispatch.split` / `dispatch.splitSize` metadata) and every chunk is
//!    submitted as an expanded job.
//! 3. Each nested holder becomes a collapsed job on the expanded jobs'
//!    results. Holders flagged `dispatch.await` are chained instead: the
//!    first waits on the other nested jobs, every next one on the previous.
//!
//! A collapsed job re-dispatches its holder on the farm, extends its own
//! dependencies with the new job ids, and leaves a processed marker so the
//! re-triggered run is a no-op.

pub mod job;
pub mod manager;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelforge_common::{Error, Result};
use reelforge_crawler::Crawler;
use reelforge_task::wrapper::{read_result_file, write_result_file};
use reelforge_task::{Context, TaskHolder};
use serde_json::Map;

use crate::dispatcher::{bool_option, str_option, Dispatcher};
use job::{processed_marker, JobData, JobKind, JOB_FILE_NAME};
use manager::{DeadlineFarmManager, FarmManager, JobSubmission};

/// Metadata flag enabling chunking.
pub const SPLIT_METADATA: &str = "dispatch.split";
/// Metadata holding the chunk size.
pub const SPLIT_SIZE_METADATA: &str = "dispatch.splitSize";
/// Metadata flag chaining a nested holder after its siblings.
pub const AWAIT_METADATA: &str = "dispatch.await";

/// Split `items` into contiguous chunks of at most `size` items.
///
/// A size of 0 keeps everything in one chunk. An empty input yields no
/// chunks.
///
/// ```
/// use reelforge_dispatch::chunkify;
///
/// let chunks = chunkify(&[1, 2, 3, 4, 5], 2);
/// assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// ```
pub fn chunkify<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(size).map(<[T]>::to_vec).collect()
}

/// Dispatches holder trees to a render farm.
///
/// Options: `expandOnTheFarm`, `jobDirectory` (must be visible from the
/// farm nodes), `splitSize` (fallback chunk size), plus the manager
/// options of [`DeadlineFarmManager`].
pub struct RenderfarmDispatcher {
    options: Map<String, serde_json::Value>,
    manager: Arc<dyn FarmManager>,
    job_directory: PathBuf,
}

impl RenderfarmDispatcher {
    /// Build with a [`DeadlineFarmManager`].
    pub fn from_options(options: &Map<String, serde_json::Value>) -> Result<Self> {
        let manager = Arc::new(DeadlineFarmManager::from_options(options)?);
        Ok(Self::with_manager(options, manager))
    }

    /// Build with any farm manager.
    pub fn with_manager(options: &Map<String, serde_json::Value>, manager: Arc<dyn FarmManager>) -> Self {
        let job_directory = str_option(options, "jobDirectory")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("reelforge-farm"));
        Self {
            options: options.clone(),
            manager,
            job_directory,
        }
    }

    fn expand_on_the_farm(&self) -> bool {
        bool_option(&self.options, "expandOnTheFarm", false)
    }

    /// This dispatcher's envelope with `expandOnTheFarm` cleared, stored in
    /// job files so farm-side dispatches expand directly.
    fn farm_envelope(&self) -> crate::dispatcher::DispatcherEnvelope {
        let mut envelope = self.to_envelope();
        envelope
            .options
            .insert("expandOnTheFarm".into(), serde_json::Value::Bool(false));
        envelope
    }

    fn new_job_dir(&self) -> Result<PathBuf> {
        let dir = self.job_directory.join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn new_job_file(&self) -> Result<PathBuf> {
        Ok(self.new_job_dir()?.join(JOB_FILE_NAME))
    }

    fn submit(&self, mut data: JobData, job_file: &Path, dependency_ids: Vec<String>) -> Result<String> {
        data.write(job_file)?;
        let id = self.manager.submit(&JobSubmission {
            name: data.label(),
            job_file: job_file.to_path_buf(),
            dependency_ids,
        })?;
        data.job_id = Some(id.clone());
        data.write(job_file)?;
        Ok(id)
    }

    fn split_size(&self, holder: &TaskHolder) -> usize {
        let task = holder.task();
        if !task.metadata_flag(SPLIT_METADATA) {
            return 0;
        }
        task.metadata(SPLIT_SIZE_METADATA)
            .and_then(|v| v.as_u64())
            .or_else(|| self.options.get("splitSize").and_then(|v| v.as_u64()))
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(0)
    }

    /// Submit one collapsed job running `holder` on the crawlers stored in
    /// `inputs`.
    fn submit_collapsed(
        &self,
        holder: &TaskHolder,
        inputs: Vec<PathBuf>,
        dependency_ids: Vec<String>,
    ) -> Result<String> {
        let job_file = self.new_job_file()?;
        let data = JobData {
            dispatcher: self.farm_envelope(),
            task_holder: holder.to_envelope(),
            job_id: None,
            kind: JobKind::Collapsed {
                task_input_file_paths: inputs,
                dependency_ids: dependency_ids.clone(),
            },
        };
        self.submit(data, &job_file, dependency_ids)
    }

    /// Expand `holder` now: chunk jobs for its task, collapsed jobs for its
    /// nested holders.
    fn expand(&self, ctx: &Context, holder: &TaskHolder, crawlers: &[Crawler]) -> Result<Vec<String>> {
        let task = holder.populate(ctx, crawlers)?;
        if task.crawlers().is_empty() {
            tracing::debug!("Task {} matched no crawlers, nothing to submit", task.type_name());
            return Ok(Vec::new());
        }

        let chunk_size = self.split_size(holder);
        let chunks = chunkify(task.crawlers(), chunk_size);
        let chunk_total = chunks.len();

        let mut expanded_ids = Vec::with_capacity(chunk_total);
        let mut results = Vec::with_capacity(chunk_total);
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let mut chunk_holder = holder.without_sub_holders();
            let size = chunk.len();
            chunk_holder.task_mut().set_crawlers(chunk);

            let job_file = self.new_job_file()?;
            let result_file = job_file.with_file_name("result.json");
            let data = JobData {
                dispatcher: self.farm_envelope(),
                task_holder: chunk_holder.to_envelope(),
                job_id: None,
                kind: JobKind::Expanded {
                    chunk_index,
                    chunk_total,
                    chunk_size: size,
                    task_result_file_path: result_file.clone(),
                },
            };
            expanded_ids.push(self.submit(data, &job_file, Vec::new())?);
            results.push(result_file);
        }
        tracing::info!(
            "Submitted {} expanded job(s) for task {}",
            expanded_ids.len(),
            task.type_name()
        );

        let (awaiting, parallel): (Vec<&TaskHolder>, Vec<&TaskHolder>) = holder
            .sub_holders()
            .iter()
            .partition(|sub| sub.task().metadata_flag(AWAIT_METADATA));

        let mut parallel_ids = Vec::new();
        for sub in parallel {
            parallel_ids.push(self.submit_collapsed(sub, results.clone(), expanded_ids.clone())?);
        }

        let mut await_ids = Vec::new();
        let mut previous: Option<String> = None;
        for sub in awaiting {
            let dependency_ids = match &previous {
                Some(id) => vec![id.clone()],
                None if parallel_ids.is_empty() => expanded_ids.clone(),
                None => parallel_ids.clone(),
            };
            let id = self.submit_collapsed(sub, results.clone(), dependency_ids)?;
            previous = Some(id.clone());
            await_ids.push(id);
        }

        let mut ids = expanded_ids;
        ids.extend(parallel_ids);
        ids.extend(await_ids);
        Ok(ids)
    }

    /// Run a job file on a farm node.
    ///
    /// `job_id` overrides the identifier recorded in the file.
    pub fn run_job(&self, ctx: &Context, job_file: &Path, job_id: Option<&str>) -> Result<Vec<String>> {
        let data = JobData::read(job_file)?;
        let holder = TaskHolder::from_envelope(ctx, data.task_holder)?;

        match data.kind {
            JobKind::Expanded {
                chunk_index,
                chunk_total,
                task_result_file_path,
                ..
            } => {
                tracing::info!(
                    "Running chunk {}/{chunk_total} of task {}",
                    chunk_index + 1,
                    holder.task().type_name()
                );
                let outputs = holder.execute(ctx, holder.task())?;
                write_result_file(&task_result_file_path, &outputs)?;
                Ok(Vec::new())
            }
            JobKind::Collapsed {
                task_input_file_paths,
                ..
            } => {
                let marker = processed_marker(job_file);
                if marker.exists() {
                    tracing::info!("{} already processed", job_file.display());
                    return Ok(Vec::new());
                }

                let mut crawlers = Vec::new();
                for path in &task_input_file_paths {
                    crawlers.extend(read_result_file(ctx, path)?);
                }
                let ids = self.expand(ctx, &holder, &crawlers)?;

                if !ids.is_empty() {
                    let own_id = job_id
                        .map(str::to_string)
                        .or(data.job_id)
                        .ok_or_else(|| {
                            Error::dispatch(
                                "collapsed job has no job id to extend",
                                job_file.display().to_string(),
                            )
                        })?;
                    self.manager.extend_dependency_ids(&own_id, &ids)?;
                }
                fs::write(&marker, ids.join("\n"))?;
                Ok(ids)
            }
        }
    }
}

impl Dispatcher for RenderfarmDispatcher {
    fn type_name(&self) -> &str {
        "renderfarm"
    }

    fn options(&self) -> &Map<String, serde_json::Value> {
        &self.options
    }

    fn dispatch(&self, ctx: &Context, holder: &TaskHolder, crawlers: &[Crawler]) -> Result<Vec<String>> {
        if !self.expand_on_the_farm() {
            return self.expand(ctx, holder, crawlers);
        }

        let input_file = self.new_job_dir()?.join("input.json");
        write_result_file(&input_file, crawlers)?;
        let id = self.submit_collapsed(holder, vec![input_file], Vec::new())?;
        tracing::info!("Submitted {} for expansion on the farm", holder.task().type_name());
        Ok(vec![id])
    }
}

/// Run a job file with the farm dispatcher recorded in it.
pub fn run_farm_job(ctx: &Context, job_file: &Path, job_id: Option<&str>) -> Result<Vec<String>> {
    let data = JobData::read(job_file)?;
    RenderfarmDispatcher::from_options(&data.dispatcher.options)?.run_job(ctx, job_file, job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_counts() {
        let items: Vec<u32> = (0..10).collect();
        for size in 1..=12 {
            let chunks = chunkify(&items, size);
            assert_eq!(chunks.len(), items.len().div_ceil(size), "size {size}");
            assert!(chunks.iter().all(|c| c.len() <= size));
            assert_eq!(chunks.concat(), items);
        }
    }

    #[test]
    fn chunk_edge_cases() {
        assert!(chunkify::<u32>(&[], 3).is_empty());
        assert_eq!(chunkify(&[1, 2, 3], 0), vec![vec![1, 2, 3]]);
    }
}
