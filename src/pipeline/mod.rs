//! Sweep execution core: options, tasks, jobs, pools and output parsing.

pub mod handlers;
pub mod job;
pub mod opts;
pub mod orchestrator;
pub mod output;
pub mod pool;
pub mod process;
pub mod table;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use handlers::{Handler, Handlers, ProgressHandler};
pub use job::{Job, JobKind, JobSpec};
pub use opts::{OptValue, Opts};
pub use orchestrator::{Executor, RunRequest, Sweep, SweepOutcome, CACHE_FILE, DATA_MODE};
pub use output::{parse_output, MetricsRecord};
pub use pool::Pool;
pub use process::Launcher;
pub use table::{ResultTable, SweepTable};
pub use task::{assemble, ExecutionStatus, ResolvedArguments, Task};
