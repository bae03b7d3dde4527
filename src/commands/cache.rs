/// `vw-executor cache` command implementation
///
/// Builds vw cache files, reports statistics and cleans the result cache.
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::cli::{CacheArgs, CacheCommands};
use crate::cli_utils::{format_size, prefix};
use crate::commands::{build_executor, build_sweep, load_config, open_cache};
use vw_executor::pipeline::CACHE_FILE;
use vw_executor::{Cache, Executor, Sweep};

pub fn cache(args: &CacheArgs) -> Result<()> {
    let config = load_config(&args.common)?;

    match &args.command {
        CacheCommands::Build {
            inputs,
            opts,
            sweep,
            input_dir,
        } => {
            let executor = build_executor(&config)?;
            let sweep = build_sweep(opts, sweep.as_deref())?;
            build(&executor, inputs, sweep, Path::new(input_dir))
        }
        CacheCommands::Stats => stats(&open_cache(&config)?),
        CacheCommands::Clean => clean(&open_cache(&config)?),
    }
}

#[derive(Debug, Serialize)]
struct BuiltCache<'a> {
    command: &'a str,
    files: Vec<&'a Path>,
}

fn build(
    executor: &Executor,
    inputs: &[String],
    sweep: Sweep,
    input_dir: &Path,
) -> Result<()> {
    let outcome = executor
        .build_cache(inputs, sweep, input_dir)
        .context("Failed to build cache files")?;

    let jobs = outcome.jobs();
    let built: Vec<BuiltCache<'_>> = jobs
        .iter()
        .map(|job| BuiltCache {
            command: &job.name,
            files: job
                .outputs
                .get(CACHE_FILE)
                .map(|files| files.iter().map(|f| f.as_path()).collect())
                .unwrap_or_default(),
        })
        .collect();

    eprintln!("{} Built {} cache command(s)", prefix(), built.len());
    println!("{}", serde_json::to_string_pretty(&built)?);
    Ok(())
}

fn stats(cache: &Cache) -> Result<()> {
    let stats = cache.stats().context("Failed to read cache statistics")?;

    eprintln!(
        "{} {} entries, {} in {}",
        prefix(),
        stats.total_entries,
        format_size(stats.total_size_bytes),
        stats.cache_dir.display()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn clean(cache: &Cache) -> Result<()> {
    eprintln!("{} Cleaning {}...", prefix(), cache.root().display());
    cache.clean().context("Failed to clean cache")?;
    eprintln!("{} Cache cleaned.", prefix());
    Ok(())
}
