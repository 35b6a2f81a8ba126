//! Job data files exchanged with farm nodes.

use std::fs;
use std::path::{Path, PathBuf};

use reelforge_common::Result;
use reelforge_task::TaskHolderEnvelope;
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatcherEnvelope;

/// File name of a job data file inside its job directory.
pub const JOB_FILE_NAME: &str = "job.json";

/// Marker written next to a collapsed job once its payload has run.
pub const PROCESSED_MARKER_NAME: &str = "job.processed";

/// What a farm job does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "jobType", rename_all = "lowercase")]
pub enum JobKind {
    /// Runs one chunk of a task and writes the output crawlers.
    Expanded {
        #[serde(rename = "chunkIndex")]
        chunk_index: usize,
        #[serde(rename = "chunkTotal")]
        chunk_total: usize,
        #[serde(rename = "chunkSize")]
        chunk_size: usize,
        #[serde(rename = "taskResultFilePath")]
        task_result_file_path: PathBuf,
    },
    /// Waits for other jobs, then dispatches a holder tree on their
    /// combined output.
    Collapsed {
        #[serde(rename = "taskInputFilePaths")]
        task_input_file_paths: Vec<PathBuf>,
        #[serde(rename = "dependencyIds", default)]
        dependency_ids: Vec<String>,
    },
}

/// Content of a `job.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    pub dispatcher: DispatcherEnvelope,
    #[serde(rename = "taskHolder")]
    pub task_holder: TaskHolderEnvelope,
    /// Farm identifier, filled in once the job has been submitted.
    #[serde(rename = "jobId", default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl JobData {
    pub fn read(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Short label used as the farm job name.
    pub fn label(&self) -> String {
        let task = &self.task_holder.task.type_name;
        match &self.kind {
            JobKind::Expanded {
                chunk_index,
                chunk_total,
                ..
            } => format!("{task} ({}/{chunk_total})", chunk_index + 1),
            JobKind::Collapsed { .. } => format!("{task} (collapsed)"),
        }
    }
}

/// Path of the processed marker for a job file.
pub fn processed_marker(job_file: &Path) -> PathBuf {
    job_file.with_file_name(PROCESSED_MARKER_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_task::{Context, CrawlerMatcher, TaskHolder};

    fn holder_envelope() -> TaskHolderEnvelope {
        let ctx = Context::with_builtins().unwrap();
        TaskHolder::new(
            ctx.tasks.create("dummy").unwrap(),
            "/out/{name}",
            CrawlerMatcher::default(),
        )
        .to_envelope()
    }

    #[test]
    fn job_type_is_a_flat_field() {
        let job = JobData {
            dispatcher: DispatcherEnvelope {
                type_name: "renderfarm".into(),
                options: Default::default(),
            },
            task_holder: holder_envelope(),
            job_id: None,
            kind: JobKind::Collapsed {
                task_input_file_paths: vec![PathBuf::from("/jobs/a/result.json")],
                dependency_ids: vec!["1".into()],
            },
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["jobType"], "collapsed");
        assert_eq!(value["taskInputFilePaths"][0], "/jobs/a/result.json");
        assert!(value.get("jobId").is_none());
        assert_eq!(job.label(), "dummy (collapsed)");
    }

    #[test]
    fn write_read_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc").join(JOB_FILE_NAME);
        let job = JobData {
            dispatcher: DispatcherEnvelope::default(),
            task_holder: holder_envelope(),
            job_id: Some("42".into()),
            kind: JobKind::Expanded {
                chunk_index: 1,
                chunk_total: 3,
                chunk_size: 4,
                task_result_file_path: dir.path().join("abc/result.json"),
            },
        };
        job.write(&path).unwrap();

        let read = JobData::read(&path).unwrap();
        assert_eq!(read.kind, job.kind);
        assert_eq!(read.job_id.as_deref(), Some("42"));
        assert_eq!(read.label(), "dummy (2/3)");
        assert_eq!(processed_marker(&path), dir.path().join("abc/job.processed"));
    }
}
