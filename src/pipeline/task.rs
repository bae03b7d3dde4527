/// A single vw invocation
///
/// Arguments are assembled once, when the task is created, by [`assemble`].
/// Running the task either reuses the cached capture (every output already
/// exists) or executes vw and persists its stderr, then parses the capture.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::opts::Opts;
use super::output::{parse_output, MetricsRecord};
use super::process::Launcher;
use crate::cache::Cache;
use crate::error::{ExecutorError, Result};
use crate::logging::{operations, status};

/// Option carrying the model a task starts from.
pub const MODEL_INPUT: &str = "-i";

/// Output slot holding the model a task writes.
pub const MODEL_OUTPUT: &str = "-f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Success,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::NotStarted => "not_started",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The job-level inputs shared by every task of a job.
#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate<'a> {
    pub opts: &'a Opts,
    /// Option under which the input file is passed (`-d`, `--data`, ...).
    pub input_mode: &'a str,
    /// Declared output slots, e.g. `-f`, `--cache_file`, `-p`.
    pub slots: &'a [String],
}

/// The per-task inputs.
#[derive(Debug, Clone, Copy)]
pub struct TaskInput<'a> {
    /// Input file name, relative to `input_dir`.
    pub input_file: &'a str,
    pub input_dir: &'a Path,
    /// Predecessor model, relative to the cache root.
    pub model_file: Option<&'a Path>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedArguments {
    pub input_file: String,
    pub input_path: PathBuf,
    pub salt: u64,
    pub model_file: Option<PathBuf>,
    pub outputs_relative: BTreeMap<String, PathBuf>,
    pub outputs: BTreeMap<String, PathBuf>,
    pub stdout_path: PathBuf,
    /// Final option string handed to the executable.
    pub args: String,
}

/// Resolve cache paths and build the option string for one task.
///
/// Cache keys are computed from the relative input name and the relative
/// model path, so they do not depend on where inputs or the cache live. The
/// option string passed to vw uses the absolute locations instead.
pub fn assemble(
    template: &TaskTemplate<'_>,
    input: &TaskInput<'_>,
    cache: &Cache,
) -> Result<ResolvedArguments> {
    let input_path = input.input_dir.join(input.input_file);
    let salt = fs::metadata(&input_path)
        .map_err(|source| ExecutorError::InputNotFound {
            path: input_path.clone(),
            source,
        })?
        .len();

    let mut opts = template.opts.clone();
    opts.insert(template.input_mode, input.input_file);
    if let Some(model) = input.model_file {
        opts.insert(MODEL_INPUT, model);
    }

    let mut outputs_relative = BTreeMap::new();
    let mut outputs = BTreeMap::new();
    for slot in template.slots {
        outputs_relative.insert(slot.clone(), cache.resolve_relative(&opts, Some(slot), salt));
        outputs.insert(slot.clone(), cache.resolve_absolute(&opts, Some(slot), salt)?);
    }
    let stdout_path = cache.resolve_absolute(&opts, None, salt)?;

    if let Some(model) = input.model_file {
        opts.insert(MODEL_INPUT, cache.root().join(model).as_path());
    }
    opts.insert(template.input_mode, input_path.as_path());
    opts.extend(
        outputs
            .iter()
            .map(|(slot, path)| (slot.clone(), path.as_path())),
    );

    Ok(ResolvedArguments {
        input_file: input.input_file.to_string(),
        input_path,
        salt,
        model_file: input.model_file.map(Path::to_path_buf),
        outputs_relative,
        outputs,
        stdout_path,
        args: opts.to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub arguments: ResolvedArguments,
    pub status: ExecutionStatus,
    pub metrics: MetricsRecord,
    pub loss: Option<f64>,
}

impl Task {
    pub fn new(arguments: ResolvedArguments) -> Self {
        Self {
            arguments,
            status: ExecutionStatus::NotStarted,
            metrics: MetricsRecord::default(),
            loss: None,
        }
    }

    pub fn args(&self) -> &str {
        &self.arguments.args
    }

    pub fn model_file(&self) -> Option<&Path> {
        self.arguments.model_file.as_deref()
    }

    pub fn outputs(&self) -> &BTreeMap<String, PathBuf> {
        &self.arguments.outputs
    }

    pub fn outputs_relative(&self) -> &BTreeMap<String, PathBuf> {
        &self.arguments.outputs_relative
    }

    pub fn stdout_path(&self) -> &Path {
        &self.arguments.stdout_path
    }

    /// Execute (or reuse) this task and parse its output.
    ///
    /// Errors are fatal for the sweep: execution disabled on a cache miss,
    /// spawn failures and filesystem errors. A run without `average loss` is
    /// not an error; it leaves the task [`ExecutionStatus::Failed`].
    pub fn run(&mut self, launcher: &Launcher, cache: &Cache, force_rerun: bool) -> Result<()> {
        if self.status == ExecutionStatus::NotStarted {
            self.status = ExecutionStatus::Running;
        }

        let result = self.execute(launcher, cache, force_rerun);
        if result.is_err() {
            self.status = ExecutionStatus::Failed;
            self.loss = None;
        }
        result
    }

    fn execute(&mut self, launcher: &Launcher, cache: &Cache, force_rerun: bool) -> Result<()> {
        let _lock = cache.lock(self.stdout_path());

        let missing = self
            .outputs()
            .values()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.stdout_path()))
            .find(|path| !path.exists())
            .map(Path::to_path_buf);

        if force_rerun || missing.is_some() {
            if let Some(path) = &missing {
                debug!(
                    operation = operations::CACHE_GET,
                    status = status::MISS,
                    path = %path.display(),
                    "result not found"
                );
            }
            if launcher.no_run() {
                return Err(ExecutorError::ResultNotFound {
                    path: missing.unwrap_or_else(|| self.stdout_path().to_path_buf()),
                });
            }

            let captured = launcher.invoke(self.args())?;
            fs::write(self.stdout_path(), captured)
                .map_err(|e| ExecutorError::io(self.stdout_path(), e))?;
            debug!(
                operation = operations::CACHE_PUT,
                status = status::SUCCESS,
                path = %self.stdout_path().display(),
                "captured output stored"
            );
        } else {
            debug!(
                operation = operations::CACHE_GET,
                status = status::SUCCESS,
                args = %self.args(),
                "result found"
            );
        }

        let (metrics, loss) = parse_output(&self.stdout()?);
        self.metrics = metrics;
        self.loss = loss;
        self.status = if loss.is_some() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        Ok(())
    }

    /// Lines of the captured output.
    pub fn stdout(&self) -> Result<Vec<String>> {
        let bytes =
            fs::read(self.stdout_path()).map_err(|e| ExecutorError::io(self.stdout_path(), e))?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }
}
