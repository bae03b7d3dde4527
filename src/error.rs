use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a task, its job and the enclosing sweep.
///
/// A run that finishes without a parseable loss is not an error; it is
/// reported through [`crate::pipeline::ExecutionStatus::Failed`].
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Result is not found at {path} and execution is disabled")]
    ResultNotFound { path: PathBuf },

    #[error("Input file not found: {path}")]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn {executable}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),
}

impl ExecutorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExecutorError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ExecutorError> = std::result::Result<T, E>;
