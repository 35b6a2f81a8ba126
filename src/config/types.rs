use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub renderfarm: RenderfarmConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Dispatcher used by `run` unless overridden (`local` or `renderfarm`)
    #[serde(default = "default_dispatcher")]
    pub default: String,

    /// Wait for locally dispatched holders and fail on a non-zero exit
    #[serde(default)]
    pub await_execution: bool,

    /// Binary started for `exec-holder`, `exec-task` and `farm-job`
    /// (default: the running executable)
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Where local job files are written (default: system temp dir)
    #[serde(default)]
    pub job_directory: Option<PathBuf>,
}

fn default_dispatcher() -> String {
    "local".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default: default_dispatcher(),
            await_execution: false,
            executable: None,
            job_directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderfarmConfig {
    /// Scheduler command line tool
    #[serde(default = "default_farm_command")]
    pub command: String,

    /// Shared directory for job data files, visible from every farm node
    #[serde(default)]
    pub job_directory: Option<PathBuf>,

    #[serde(default)]
    pub pool: Option<String>,

    #[serde(default)]
    pub group: Option<String>,

    /// Job priority (0-100)
    #[serde(default)]
    pub priority: Option<i64>,

    /// Chunk size for holders flagged `dispatch.split` without their own size
    #[serde(default)]
    pub split_size: Option<u64>,

    /// Submit a single job that expands the holder tree on the farm
    #[serde(default)]
    pub expand_on_the_farm: bool,

    /// Failed attempts before the scheduler marks a job failed
    #[serde(default)]
    pub job_fail_retry_attempts: Option<i64>,
}

fn default_farm_command() -> String {
    "deadlinecommand".to_string()
}

impl Default for RenderfarmConfig {
    fn default() -> Self {
        Self {
            command: default_farm_command(),
            job_directory: None,
            pool: None,
            group: None,
            priority: None,
            split_size: None,
            expand_on_the_farm: false,
            job_fail_retry_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginsConfig {
    /// Compiled-in plugin identifiers loaded at startup
    #[serde(default)]
    pub load: Vec<String>,
}

impl Config {
    /// Options for the named dispatcher, in the dispatcher's own option
    /// names. Unset values are left out so the dispatcher defaults apply.
    pub fn dispatcher_options(&self, name: &str) -> Map<String, serde_json::Value> {
        let mut options = Map::new();
        if let Some(executable) = &self.dispatch.executable {
            options.insert("executable".into(), json!(expand_path(executable)));
        }

        match name {
            "local" => {
                options.insert("awaitExecution".into(), json!(self.dispatch.await_execution));
                if let Some(dir) = &self.dispatch.job_directory {
                    options.insert("jobDirectory".into(), json!(expand_path(dir)));
                }
            }
            "renderfarm" => {
                let farm = &self.renderfarm;
                options.insert("command".into(), json!(farm.command));
                options.insert("expandOnTheFarm".into(), json!(farm.expand_on_the_farm));
                if let Some(dir) = &farm.job_directory {
                    options.insert("jobDirectory".into(), json!(expand_path(dir)));
                }
                let optional = [
                    ("pool", farm.pool.as_ref().map(|v| json!(v))),
                    ("group", farm.group.as_ref().map(|v| json!(v))),
                    ("priority", farm.priority.map(|v| json!(v))),
                    ("splitSize", farm.split_size.map(|v| json!(v))),
                    ("jobFailRetryAttempts", farm.job_fail_retry_attempts.map(|v| json!(v))),
                ];
                for (key, value) in optional {
                    if let Some(value) = value {
                        options.insert(key.into(), value);
                    }
                }
            }
            _ => {}
        }
        options
    }
}

fn expand_path(path: &std::path::Path) -> String {
    shellexpand::tilde(&path.to_string_lossy()).into_owned()
}
