/// Lifecycle observers
///
/// Handlers only observe: they receive shared references and cannot change
/// what runs next. Every hook has an empty default.
use std::sync::Arc;
use tracing::info;

use super::job::Job;
use super::opts::Opts;

pub trait Handler: Send + Sync {
    fn on_start(&self, _inputs: &[String], _sweep: &[Opts]) {}
    fn on_finish(&self, _jobs: &[Job]) {}
    fn on_job_start(&self, _job: &Job) {}
    fn on_task_start(&self, _job: &Job, _task_idx: usize) {}
    fn on_task_finish(&self, _job: &Job, _task_idx: usize) {}
    fn on_job_finish(&self, _job: &Job) {}
}

/// Fan-out over a list of handlers.
#[derive(Clone, Default)]
pub struct Handlers {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Handlers {
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self { handlers }
    }

    pub fn push(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }
}

impl Handler for Handlers {
    fn on_start(&self, inputs: &[String], sweep: &[Opts]) {
        self.handlers.iter().for_each(|h| h.on_start(inputs, sweep));
    }

    fn on_finish(&self, jobs: &[Job]) {
        self.handlers.iter().for_each(|h| h.on_finish(jobs));
    }

    fn on_job_start(&self, job: &Job) {
        self.handlers.iter().for_each(|h| h.on_job_start(job));
    }

    fn on_task_start(&self, job: &Job, task_idx: usize) {
        self.handlers
            .iter()
            .for_each(|h| h.on_task_start(job, task_idx));
    }

    fn on_task_finish(&self, job: &Job, task_idx: usize) {
        self.handlers
            .iter()
            .for_each(|h| h.on_task_finish(job, task_idx));
    }

    fn on_job_finish(&self, job: &Job) {
        self.handlers.iter().for_each(|h| h.on_job_finish(job));
    }
}

/// Reports sweep progress through `tracing` at info level.
pub struct ProgressHandler;

impl Handler for ProgressHandler {
    fn on_start(&self, inputs: &[String], sweep: &[Opts]) {
        info!(
            inputs = inputs.len(),
            points = sweep.len(),
            "sweep started"
        );
    }

    fn on_finish(&self, jobs: &[Job]) {
        let failed = jobs.iter().filter(|job| job.failed.is_some()).count();
        info!(jobs = jobs.len(), failed, "sweep finished");
    }

    fn on_job_finish(&self, job: &Job) {
        info!(
            job = %job.name,
            status = %job.status,
            loss = ?job.loss,
            "job finished"
        );
    }
}
