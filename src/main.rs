mod cli;

use reelforge::{config, loader, plugins};
use reelforge_common::PathHolder;
use reelforge_crawler::Crawler;
use reelforge_dispatch::{local, run_farm_job, run_local_job, DispatcherRegistry};
use reelforge_task::{wrapper::run_task_file, Context};

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelforge=trace,reelforge_task=trace,reelforge_dispatch=trace,reelforge_crawler=debug,reelforge_template=debug".to_string()
        } else {
            "reelforge=info,reelforge_task=info,reelforge_dispatch=info,reelforge_crawler=warn,reelforge_template=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            pipeline,
            sources,
            dispatcher,
            dry_run,
        } => run_pipeline(
            &pipeline,
            &sources,
            dispatcher.as_deref(),
            dry_run,
            cli.config.as_deref(),
        ),
        Commands::ExecHolder { job_file } => exec_holder(&job_file, cli.config.as_deref()),
        Commands::ExecTask {
            task_file,
            result_file,
        } => exec_task(&task_file, &result_file, cli.config.as_deref()),
        Commands::FarmJob { job_file, job_id } => {
            farm_job(&job_file, job_id.as_deref(), cli.config.as_deref())
        }
        Commands::Types => list_types(cli.config.as_deref()),
        Commands::Validate { pipeline } => validate(cli.config.as_deref(), pipeline.as_deref()),
        Commands::Version => {
            println!("reelforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_context(config_path: Option<&Path>) -> Result<(config::Config, Context)> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = plugins::build_context(&config.plugins.load).context("Failed to load plugins")?;
    Ok((config, ctx))
}

/// Crawl every source: files as they are, directories recursively.
fn crawl_sources(ctx: &Context, sources: &[PathBuf]) -> Result<Vec<Crawler>> {
    let mut crawlers = Vec::new();
    for source in sources {
        if !source.exists() {
            anyhow::bail!("Source does not exist: {:?}", source);
        }
        let crawler = ctx
            .crawlers
            .create(PathHolder::from(source.as_path()), None)
            .with_context(|| format!("Failed to crawl {:?}", source))?;
        if crawler.is_leaf() {
            crawlers.push(crawler);
        } else {
            crawlers.extend(crawler.glob(&ctx.crawlers, &[], true));
        }
    }
    Ok(crawlers)
}

fn run_pipeline(
    pipeline: &Path,
    sources: &[PathBuf],
    dispatcher: Option<&str>,
    dry_run: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let (config, ctx) = load_context(config_path)?;

    let holders = loader::load_pipeline(&ctx, pipeline)?;
    if holders.is_empty() {
        println!("Pipeline {:?} has no task holders.", pipeline);
        return Ok(());
    }

    let crawlers = crawl_sources(&ctx, sources)?;
    tracing::info!("Crawled {} path(s)", crawlers.len());

    if dry_run {
        for holder in &holders {
            let task = holder.populate(&ctx, &crawlers)?;
            println!("{} ({} match(es))", task.type_name(), task.crawlers().len());
            for (crawler, target) in task.crawlers() {
                println!("  {} -> {}", crawler.file_path(), target);
            }
        }
        println!("\n[DRY RUN] Nothing was dispatched");
        return Ok(());
    }

    let name = dispatcher.unwrap_or(config.dispatch.default.as_str());
    let dispatcher = DispatcherRegistry::with_builtins()
        .create(name, &config.dispatcher_options(name))
        .with_context(|| format!("Failed to create dispatcher '{}'", name))?;

    for holder in &holders {
        let ids = dispatcher
            .dispatch(&ctx, holder, &crawlers)
            .with_context(|| format!("Failed to dispatch task {}", holder.task().type_name()))?;
        println!("{}: {}", holder.task().type_name(), ids.join(" "));
    }

    local::wait_for_running_jobs();
    Ok(())
}

fn exec_holder(job_file: &Path, config_path: Option<&Path>) -> Result<()> {
    let (_, ctx) = load_context(config_path)?;
    let outputs = run_local_job(&ctx, job_file)
        .with_context(|| format!("Local job failed: {:?}", job_file))?;
    for output in outputs {
        println!("{}", output.file_path());
    }
    Ok(())
}

fn exec_task(task_file: &Path, result_file: &Path, config_path: Option<&Path>) -> Result<()> {
    let (_, ctx) = load_context(config_path)?;
    let outputs = run_task_file(&ctx, task_file, result_file)
        .with_context(|| format!("Task failed: {:?}", task_file))?;
    tracing::info!("Task wrote {} output(s) to {:?}", outputs.len(), result_file);
    Ok(())
}

fn farm_job(job_file: &Path, job_id: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let (_, ctx) = load_context(config_path)?;
    let ids = run_farm_job(&ctx, job_file, job_id)
        .with_context(|| format!("Farm job failed: {:?}", job_file))?;
    if !ids.is_empty() {
        println!("Submitted: {}", ids.join(" "));
    }
    Ok(())
}

fn list_types(config_path: Option<&Path>) -> Result<()> {
    let (_, ctx) = load_context(config_path)?;
    let sections = [
        ("Crawler types", ctx.crawlers.names()),
        ("Tasks", ctx.tasks.names()),
        ("Task wrappers", ctx.wrappers.names()),
        ("Template functions", ctx.functions.names()),
        ("Dispatchers", DispatcherRegistry::with_builtins().names()),
        ("Plugins", ctx.plugins.names()),
    ];
    for (title, names) in sections {
        println!("{}:", title);
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn validate(config_path: Option<&Path>, pipeline: Option<&Path>) -> Result<()> {
    match config_path {
        Some(p) => println!("Validating config: {:?}", p),
        None => println!("No config file specified, using defaults"),
    }
    let (config, ctx) = load_context(config_path)?;
    println!("✓ Configuration is valid");
    println!("  Default dispatcher: {}", config.dispatch.default);
    println!("  Render farm command: {}", config.renderfarm.command);
    println!("  Plugins loaded: {}", config.plugins.load.len());

    if let Some(pipeline) = pipeline {
        let holders = loader::load_pipeline(&ctx, pipeline)?;
        println!("✓ Pipeline is valid");
        println!("  Top-level task holders: {}", holders.len());
        for holder in &holders {
            println!(
                "    {} -> {} ({} nested)",
                holder.task().type_name(),
                holder.target_template(),
                holder.sub_holders().len()
            );
        }
    }
    Ok(())
}
