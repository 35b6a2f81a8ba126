//! Render farm managers: where jobs are actually submitted.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use reelforge_common::{Error, Result};
use serde_json::Map;

use crate::dispatcher::str_option;

/// One job submission.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    /// Display name.
    pub name: String,
    /// Job data file the farm node runs.
    pub job_file: PathBuf,
    /// Jobs that must finish first.
    pub dependency_ids: Vec<String>,
}

/// Interface to an external job scheduler.
pub trait FarmManager: Send + Sync {
    /// Submit a job and return its identifier.
    fn submit(&self, job: &JobSubmission) -> Result<String>;

    /// Make `job_id` additionally wait for `dependency_ids`.
    fn extend_dependency_ids(&self, job_id: &str, dependency_ids: &[String]) -> Result<()>;
}

/// Submits through Deadline's `deadlinecommand`.
///
/// Each job runs `<executable> farm-job <job file>` on the node with the
/// CommandLine plugin. Retries are left to Deadline's failure detection
/// (`jobFailRetryAttempts`).
#[derive(Debug, Clone)]
pub struct DeadlineFarmManager {
    command: String,
    executable: PathBuf,
    pool: Option<String>,
    group: Option<String>,
    priority: Option<i64>,
    job_fail_retry_attempts: Option<i64>,
}

impl DeadlineFarmManager {
    /// Options: `command` (default `deadlinecommand`), `executable`
    /// (default: current executable), `pool`, `group`, `priority`,
    /// `jobFailRetryAttempts`.
    pub fn from_options(options: &Map<String, serde_json::Value>) -> Result<Self> {
        let executable = match str_option(options, "executable") {
            Some(path) => PathBuf::from(path),
            None => std::env::current_exe()?,
        };
        Ok(Self {
            command: str_option(options, "command")
                .unwrap_or("deadlinecommand")
                .to_string(),
            executable,
            pool: str_option(options, "pool").map(str::to_string),
            group: str_option(options, "group").map(str::to_string),
            priority: options.get("priority").and_then(|v| v.as_i64()),
            job_fail_retry_attempts: options.get("jobFailRetryAttempts").and_then(|v| v.as_i64()),
        })
    }

    fn job_info(&self, job: &JobSubmission) -> String {
        let mut lines = vec![
            "Plugin=CommandLine".to_string(),
            format!("Name={}", job.name),
        ];
        if let Some(pool) = &self.pool {
            lines.push(format!("Pool={pool}"));
        }
        if let Some(group) = &self.group {
            lines.push(format!("Group={group}"));
        }
        if let Some(priority) = self.priority {
            lines.push(format!("Priority={priority}"));
        }
        if let Some(retries) = self.job_fail_retry_attempts {
            lines.push("OverrideJobFailureDetection=true".to_string());
            lines.push(format!("FailureDetectionJobErrors={retries}"));
        }
        if !job.dependency_ids.is_empty() {
            lines.push(format!("JobDependencies={}", job.dependency_ids.join(",")));
            lines.push("ResumeOnCompleteDependencies=true".to_string());
        }
        lines.join("\n")
    }

    fn plugin_info(&self, job: &JobSubmission) -> String {
        format!(
            "Executable={}\nArguments=farm-job \"{}\"",
            self.executable.display(),
            job.job_file.display()
        )
    }

    fn run(&self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.command).args(args).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::dispatch(
                format!("{} exited with {}", self.command, output.status),
                format!("{stdout}{stderr}"),
            ));
        }
        Ok(stdout)
    }
}

/// Extract the `JobID=...` value of a submission output.
pub fn parse_job_id(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("JobID="))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

impl FarmManager for DeadlineFarmManager {
    fn submit(&self, job: &JobSubmission) -> Result<String> {
        let dir = job
            .job_file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        let info_file = dir.join("deadline_job_info.job");
        let plugin_file = dir.join("deadline_plugin_info.job");
        fs::write(&info_file, self.job_info(job))?;
        fs::write(&plugin_file, self.plugin_info(job))?;

        let output = self.run(&[
            info_file.display().to_string(),
            plugin_file.display().to_string(),
        ])?;
        let id = parse_job_id(&output)
            .ok_or_else(|| Error::dispatch("no JobID in submission output", output.clone()))?;
        tracing::info!("Submitted {} as Deadline job {id}", job.name);
        Ok(id)
    }

    fn extend_dependency_ids(&self, job_id: &str, dependency_ids: &[String]) -> Result<()> {
        let current = self.run(&[
            "-GetJobSetting".to_string(),
            job_id.to_string(),
            "JobDependencies".to_string(),
        ])?;
        let mut ids: Vec<String> = current
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        for id in dependency_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        self.run(&[
            "-SetJobSetting".to_string(),
            job_id.to_string(),
            "JobDependencies".to_string(),
            ids.join(","),
        ])?;
        self.run(&[
            "-SetJobSetting".to_string(),
            job_id.to_string(),
            "ResumeOnCompleteDependencies".to_string(),
            "true".to_string(),
        ])?;
        tracing::info!("Job {job_id} now waits on {} job(s)", ids.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn manager(options: serde_json::Value) -> DeadlineFarmManager {
        DeadlineFarmManager::from_options(options.as_object().unwrap()).unwrap()
    }

    #[test]
    fn job_id_parsing() {
        let output = "Submitting to Repository: /mnt/deadline\n\nResult=Success\nJobID=5f2a1c\nThe job was submitted successfully.\n";
        assert_eq!(parse_job_id(output).as_deref(), Some("5f2a1c"));
        assert_eq!(parse_job_id("Result=Failed\nError: bad pool"), None);
        assert_eq!(parse_job_id("JobID=\n"), None);
    }

    #[test]
    fn job_info_lists_settings_and_dependencies() {
        let m = manager(json!({
            "executable": "/opt/reelforge",
            "pool": "comp",
            "priority": 60,
            "jobFailRetryAttempts": 3
        }));
        let job = JobSubmission {
            name: "convertImage (1/3)".into(),
            job_file: PathBuf::from("/jobs/x/job.json"),
            dependency_ids: vec!["a".into(), "b".into()],
        };
        let info = m.job_info(&job);
        assert!(info.contains("Name=convertImage (1/3)"));
        assert!(info.contains("Pool=comp"));
        assert!(info.contains("Priority=60"));
        assert!(info.contains("FailureDetectionJobErrors=3"));
        assert!(info.contains("JobDependencies=a,b"));
        assert!(!info.contains("Group="));
        assert_eq!(
            m.plugin_info(&job),
            "Executable=/opt/reelforge\nArguments=farm-job \"/jobs/x/job.json\""
        );
    }

    #[cfg(unix)]
    #[test]
    fn output_without_job_id_is_a_dispatch_error() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(json!({"command": "echo", "executable": "/opt/reelforge"}));
        let job = JobSubmission {
            name: "dummy".into(),
            job_file: dir.path().join("job.json"),
            dependency_ids: vec![],
        };
        assert_matches!(m.submit(&job), Err(Error::Dispatch { output, .. }) if output.contains("deadline_job_info"));
    }
}
