/// Tabular sweeps
///
/// A sweep table is a list of rows keyed by column name. Columns starting with
/// `!` hold results and are never passed to vw. Result rows repeat the
/// configuration columns and add `!Loss`, `!Status`, `!Populated`, `!Metrics`
/// and `!FinalMetrics`; the finished [`Job`] is kept on the row in memory.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::job::Job;
use super::opts::{OptValue, Opts};
use super::output::{final_metrics_table, metrics_table, MetricsRow};
use super::task::ExecutionStatus;
use crate::error::{ExecutorError, Result};

/// Marks derived result columns.
pub const RESULT_PREFIX: char = '!';

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SweepTable {
    rows: Vec<BTreeMap<String, OptValue>>,
}

impl SweepTable {
    /// Parse a JSON array of row objects.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ExecutorError::InvalidSweep(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ExecutorError::io(path, e))?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One configuration per row, without result columns.
    pub fn configurations(&self) -> Vec<Opts> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(column, _)| !column.starts_with(RESULT_PREFIX))
                    .map(|(column, value)| (column.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    #[serde(flatten)]
    pub config: Opts,
    #[serde(rename = "!Loss")]
    pub loss: Option<f64>,
    #[serde(rename = "!Status")]
    pub status: ExecutionStatus,
    #[serde(rename = "!Populated")]
    pub populated: BTreeMap<String, Vec<PathBuf>>,
    #[serde(rename = "!Metrics")]
    pub metrics: Vec<MetricsRow>,
    #[serde(rename = "!FinalMetrics")]
    pub final_metrics: Vec<BTreeMap<String, String>>,
    #[serde(skip)]
    pub job: Job,
}

impl From<Job> for ResultRow {
    fn from(job: Job) -> Self {
        Self {
            config: job.opts.clone(),
            loss: if job.failed.is_none() { job.loss } else { None },
            status: job.status,
            populated: job.outputs.clone(),
            metrics: metrics_table(&job.metrics),
            final_metrics: final_metrics_table(&job.metrics),
            job,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        Self {
            rows: jobs.into_iter().map(ResultRow::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ExecutorError::InvalidSweep(e.to_string()))
    }
}
