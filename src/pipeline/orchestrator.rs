/// Sweep orchestration
///
/// [`Executor`] turns a sweep (one configuration, a list, or a table) into
/// one [`Job`] per configuration and runs them through a [`Pool`]. Results
/// come back in the order the configurations were given.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::handlers::{Handler, Handlers};
use super::job::{Job, JobKind, JobSpec};
use super::opts::{Opts, CMD_KEY};
use super::pool::Pool;
use super::process::Launcher;
use super::table::{ResultTable, SweepTable};
use crate::cache::Cache;
use crate::error::Result;

/// Default option under which input files are passed.
pub const DATA_MODE: &str = "-d";

/// Output slot of vw cache files.
pub const CACHE_FILE: &str = "--cache_file";

/// Files and slots shared by every job of a sweep.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub input_mode: String,
    pub input_dir: PathBuf,
}

impl RunRequest {
    pub fn new(inputs: Vec<String>) -> Self {
        Self {
            inputs,
            outputs: Vec::new(),
            input_mode: DATA_MODE.to_string(),
            input_dir: PathBuf::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: Vec<String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_input_mode(mut self, input_mode: impl Into<String>) -> Self {
        self.input_mode = input_mode.into();
        self
    }

    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = input_dir.into();
        self
    }
}

#[derive(Debug, Clone)]
pub enum Sweep {
    Single(Opts),
    Points(Vec<Opts>),
    Table(SweepTable),
}

#[derive(Debug, Clone)]
pub enum SweepOutcome {
    Single(Job),
    Points(Vec<Job>),
    Table(ResultTable),
}

impl SweepOutcome {
    pub fn jobs(&self) -> Vec<&Job> {
        match self {
            SweepOutcome::Single(job) => vec![job],
            SweepOutcome::Points(jobs) => jobs.iter().collect(),
            SweepOutcome::Table(table) => table.rows.iter().map(|row| &row.job).collect(),
        }
    }
}

#[derive(Clone)]
pub struct Executor {
    launcher: Launcher,
    cache: Arc<Cache>,
    pool: Pool,
    reset: bool,
    handlers: Handlers,
}

impl Executor {
    /// `procs` bounds how many jobs run at once; 1 runs them sequentially.
    pub fn new(vw: impl AsRef<Path>, cache: Arc<Cache>, procs: usize) -> Self {
        Self {
            launcher: Launcher::new(vw, false),
            cache,
            pool: Pool::new(procs),
            reset: false,
            handlers: Handlers::default(),
        }
    }

    pub fn with_procs(mut self, procs: usize) -> Self {
        self.pool = Pool::new(procs);
        self
    }

    /// Forbid running vw: every result must already be cached.
    pub fn with_no_run(mut self, no_run: bool) -> Self {
        self.launcher = Launcher::new(self.launcher.executable(), no_run);
        self
    }

    /// Re-run every task even when its results are cached.
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn pool(&self) -> Pool {
        self.pool
    }

    /// Train one chain of models per configuration.
    pub fn train(&self, request: &RunRequest, sweep: Sweep) -> Result<SweepOutcome> {
        self.run(request, sweep, JobKind::Training)
    }

    /// Evaluate every input independently per configuration.
    pub fn test(&self, request: &RunRequest, sweep: Sweep) -> Result<SweepOutcome> {
        self.run(request, sweep, JobKind::Evaluation)
    }

    /// Build vw cache files for the distinct cache commands of a sweep.
    pub fn build_cache(
        &self,
        inputs: &[String],
        sweep: Sweep,
        input_dir: &Path,
    ) -> Result<SweepOutcome> {
        let request = RunRequest::new(inputs.to_vec())
            .with_outputs(vec![CACHE_FILE.to_string()])
            .with_input_mode(DATA_MODE)
            .with_input_dir(input_dir);

        let cache_sweep = match sweep {
            Sweep::Single(opts) => Sweep::Single(cache_point(opts.cache_cmd())),
            Sweep::Points(points) => Sweep::Points(dedup_cache_points(&points)),
            Sweep::Table(table) => Sweep::Points(dedup_cache_points(&table.configurations())),
        };
        self.run(&request, cache_sweep, JobKind::Evaluation)
    }

    fn run(&self, request: &RunRequest, sweep: Sweep, kind: JobKind) -> Result<SweepOutcome> {
        match sweep {
            Sweep::Single(opts) => {
                self.handlers
                    .on_start(&request.inputs, std::slice::from_ref(&opts));
                let job = self.run_job(request, opts, kind)?;
                self.handlers.on_finish(std::slice::from_ref(&job));
                Ok(SweepOutcome::Single(job))
            }
            Sweep::Points(points) => Ok(SweepOutcome::Points(
                self.run_points(request, points, kind)?,
            )),
            Sweep::Table(table) => {
                let jobs = self.run_points(request, table.configurations(), kind)?;
                Ok(SweepOutcome::Table(ResultTable::from_jobs(jobs)))
            }
        }
    }

    fn run_points(&self, request: &RunRequest, points: Vec<Opts>, kind: JobKind) -> Result<Vec<Job>> {
        self.handlers.on_start(&request.inputs, &points);
        let jobs = self
            .pool
            .map(points, |opts| self.run_job(request, opts, kind))
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        self.handlers.on_finish(&jobs);
        Ok(jobs)
    }

    fn run_job(&self, request: &RunRequest, opts: Opts, kind: JobKind) -> Result<Job> {
        let mut job = Job::new(
            JobSpec {
                kind,
                opts,
                inputs: &request.inputs,
                input_dir: &request.input_dir,
                outputs: &request.outputs,
                input_mode: &request.input_mode,
            },
            &self.cache,
        )?;
        job.run(&self.launcher, &self.cache, self.reset, &self.handlers)?;
        Ok(job)
    }
}

fn cache_point(cache_cmd: String) -> Opts {
    let mut opts = Opts::new();
    opts.insert(CMD_KEY, cache_cmd);
    opts
}

/// One `#cmd` configuration per distinct cache command, in sorted order.
fn dedup_cache_points(points: &[Opts]) -> Vec<Opts> {
    points
        .iter()
        .map(Opts::cache_cmd)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(cache_point)
        .collect()
}
