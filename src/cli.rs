use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(author, version, about = "Crawl media files and run task holder pipelines locally or on a render farm")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline over source paths
    Run {
        /// Pipeline JSON file or directory of pipeline files
        #[arg(required = true)]
        pipeline: PathBuf,

        /// Files or directories to crawl
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Dispatcher to use instead of the configured default
        #[arg(short, long)]
        dispatcher: Option<String>,

        /// List the matched crawlers and targets without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a locally dispatched holder job file
    #[command(hide = true)]
    ExecHolder {
        /// Job file written by the local dispatcher
        job_file: PathBuf,
    },

    /// Run a serialized task and write its output crawlers
    #[command(hide = true)]
    ExecTask {
        /// Task JSON file
        task_file: PathBuf,

        /// Where to write the output crawlers
        result_file: PathBuf,
    },

    /// Run a render farm job file
    FarmJob {
        /// Job data file
        job_file: PathBuf,

        /// Farm job id, when the scheduler passes it on the command line
        #[arg(long)]
        job_id: Option<String>,
    },

    /// List registered crawler types, tasks, template functions, dispatchers and plugins
    Types,

    /// Validate configuration file and optionally a pipeline
    Validate {
        /// Pipeline file or directory to load
        pipeline: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
