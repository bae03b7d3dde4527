// Library interface for vw-executor
// This allows integration tests and external code to drive sweeps directly

pub mod cache;
pub mod config;
pub mod config_discovery;
pub mod error;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use cache::{default_cache_dir, Cache};
pub use config::ExecutorConfig;
pub use config_discovery::{discover_config, load_config_with_discovery};
pub use error::ExecutorError;
pub use pipeline::{
    ExecutionStatus, Executor, Job, JobKind, Opts, RunRequest, Sweep, SweepOutcome, SweepTable,
};
