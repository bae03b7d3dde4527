/// An ordered chain of tasks for one sweep point
///
/// All task arguments, including cache paths, are resolved when the job is
/// built. A training job can therefore chain each task to the model path its
/// predecessor *will* write, before anything runs.
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info_span};

use super::handlers::Handler;
use super::opts::Opts;
use super::output::MetricsRecord;
use super::process::Launcher;
use super::task::{assemble, ExecutionStatus, Task, TaskInput, TaskTemplate, MODEL_OUTPUT};
use crate::cache::Cache;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobKind {
    /// One independent task per input file.
    Evaluation,
    /// Each task continues from the model written by the previous one.
    Training,
}

/// Everything needed to build a job.
#[derive(Debug, Clone)]
pub struct JobSpec<'a> {
    pub kind: JobKind,
    pub opts: Opts,
    pub inputs: &'a [String],
    pub input_dir: &'a Path,
    pub outputs: &'a [String],
    pub input_mode: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub name: String,
    pub kind: JobKind,
    pub opts: Opts,
    pub input_mode: String,
    /// Output slots every task produces.
    pub slots: Vec<String>,
    pub tasks: Vec<Task>,
    pub status: ExecutionStatus,
    /// Loss of the last task, set only when the whole job succeeded.
    pub loss: Option<f64>,
    /// Produced paths per slot, in task order.
    pub outputs: BTreeMap<String, Vec<PathBuf>>,
    /// Metrics of each successful task, in task order.
    pub metrics: Vec<MetricsRecord>,
    /// Index of the task that stopped the job.
    pub failed: Option<usize>,
}

impl Job {
    pub fn new(spec: JobSpec<'_>, cache: &Cache) -> Result<Self> {
        let mut slots = spec.outputs.to_vec();
        if spec.kind == JobKind::Training && !slots.iter().any(|slot| slot == MODEL_OUTPUT) {
            slots.push(MODEL_OUTPUT.to_string());
        }

        let template = TaskTemplate {
            opts: &spec.opts,
            input_mode: spec.input_mode,
            slots: &slots,
        };

        let mut tasks: Vec<Task> = Vec::with_capacity(spec.inputs.len());
        for input_file in spec.inputs {
            let model_file = match spec.kind {
                JobKind::Evaluation => None,
                JobKind::Training => tasks
                    .last()
                    .and_then(|previous| previous.outputs_relative().get(MODEL_OUTPUT))
                    .cloned(),
            };
            let input = TaskInput {
                input_file,
                input_dir: spec.input_dir,
                model_file: model_file.as_deref(),
            };
            tasks.push(Task::new(assemble(&template, &input, cache)?));
        }

        Ok(Self {
            name: spec.opts.job_name(),
            kind: spec.kind,
            input_mode: spec.input_mode.to_string(),
            outputs: empty_outputs(&slots),
            opts: spec.opts,
            slots,
            tasks,
            status: ExecutionStatus::NotStarted,
            loss: None,
            metrics: Vec::new(),
            failed: None,
        })
    }

    /// Run tasks in order, stopping at the first failed one.
    ///
    /// Returns an error only for fatal conditions (see [`Task::run`]); a
    /// failed task is recorded in [`Job::failed`] and the job status.
    pub fn run(
        &mut self,
        launcher: &Launcher,
        cache: &Cache,
        force_rerun: bool,
        handler: &dyn Handler,
    ) -> Result<()> {
        let span = info_span!("job", name = %self.name);
        let _enter = span.enter();

        handler.on_job_start(self);
        debug!("starting job");
        self.status = ExecutionStatus::Running;
        self.outputs = empty_outputs(&self.slots);
        self.metrics.clear();
        self.failed = None;
        self.loss = None;

        for idx in 0..self.tasks.len() {
            debug!(task = idx, "starting task");
            handler.on_task_start(self, idx);
            if let Err(e) = self.tasks[idx].run(launcher, cache, force_rerun) {
                self.status = ExecutionStatus::Failed;
                self.failed = Some(idx);
                debug!(task = idx, error = %e, "task aborted");
                handler.on_task_finish(self, idx);
                handler.on_job_finish(self);
                return Err(e);
            }
            handler.on_task_finish(self, idx);

            let task = &self.tasks[idx];
            debug!(task = idx, status = %task.status, "task finished");
            if task.status == ExecutionStatus::Failed {
                self.failed = Some(idx);
                break;
            }
            for (slot, path) in task.outputs() {
                self.outputs
                    .entry(slot.clone())
                    .or_default()
                    .push(path.clone());
            }
            self.metrics.push(task.metrics.clone());
        }

        self.status = match self.failed {
            Some(idx) => self.tasks[idx].status,
            None => ExecutionStatus::Success,
        };
        self.loss = match (self.status, self.tasks.last()) {
            (ExecutionStatus::Success, Some(last)) => last.loss,
            _ => None,
        };
        debug!(status = %self.status, "job finished");
        handler.on_job_finish(self);
        Ok(())
    }

    pub fn failed_task(&self) -> Option<&Task> {
        self.failed.and_then(|idx| self.tasks.get(idx))
    }
}

fn empty_outputs(slots: &[String]) -> BTreeMap<String, Vec<PathBuf>> {
    slots.iter().map(|slot| (slot.clone(), Vec::new())).collect()
}
