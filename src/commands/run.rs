/// `vw-executor train` / `vw-executor test` command implementation
///
/// Runs a sweep and prints one JSON summary per job (or the result table
/// for `--sweep`) to stdout.
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli::RunArgs;
use crate::cli_utils::prefix;
use crate::commands::{build_executor, build_sweep, load_config};
use vw_executor::pipeline::{ExecutionStatus, Job, RunRequest, SweepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Test,
}

/// Compact view of a finished job
#[derive(Debug, Serialize)]
struct JobSummary<'a> {
    name: &'a str,
    status: ExecutionStatus,
    loss: Option<f64>,
    outputs: &'a BTreeMap<String, Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_task: Option<&'a str>,
}

impl<'a> From<&'a Job> for JobSummary<'a> {
    fn from(job: &'a Job) -> Self {
        Self {
            name: &job.name,
            status: job.status,
            loss: job.loss,
            outputs: &job.outputs,
            failed_task: job.failed_task().map(|task| task.args()),
        }
    }
}

pub fn run(args: &RunArgs, mode: Mode) -> Result<()> {
    let config = load_config(&args.common)?;
    let executor = build_executor(&config)?;
    let sweep = build_sweep(&args.opts, args.sweep.as_deref())?;

    let request = RunRequest::new(args.inputs.clone())
        .with_outputs(args.outputs.clone())
        .with_input_mode(&args.input_mode)
        .with_input_dir(&args.input_dir);

    let start = Instant::now();
    let outcome = match mode {
        Mode::Train => executor.train(&request, sweep),
        Mode::Test => executor.test(&request, sweep),
    }
    .context("Sweep failed")?;

    let failed = outcome
        .jobs()
        .iter()
        .filter(|job| job.status != ExecutionStatus::Success)
        .count();
    eprintln!(
        "{} {} job(s) finished in {:.2}s, {} failed",
        prefix(),
        outcome.jobs().len(),
        start.elapsed().as_secs_f64(),
        failed
    );

    println!("{}", render(&outcome)?);
    Ok(())
}

fn render(outcome: &SweepOutcome) -> Result<String> {
    let json = match outcome {
        SweepOutcome::Table(table) => table.to_json()?,
        SweepOutcome::Single(job) => serde_json::to_string_pretty(&JobSummary::from(job))?,
        SweepOutcome::Points(jobs) => serde_json::to_string_pretty(
            &jobs.iter().map(JobSummary::from).collect::<Vec<_>>(),
        )?,
    };
    Ok(json)
}
