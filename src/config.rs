use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::default_cache_dir;

/// Complete vw-executor configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub executor: RunnerConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// How vw is launched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// vw executable (name on PATH or path)
    #[serde(default = "default_vw")]
    pub vw: String,

    /// Jobs run in parallel (1 = sequential)
    #[serde(default = "default_procs")]
    pub procs: usize,

    /// Fail instead of running vw when a result is not cached
    #[serde(default)]
    pub no_run: bool,

    /// Re-run vw even when results are cached
    #[serde(default)]
    pub reset: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            vw: default_vw(),
            procs: default_procs(),
            no_run: false,
            reset: false,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Cache directory path (defaults to the platform cache dir)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_vw() -> String {
    "vw".to_string()
}

fn default_procs() -> usize {
    num_cpus::get()
}

impl ExecutorConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ExecutorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.executor.vw.trim().is_empty() {
            anyhow::bail!("executor.vw must be set");
        }

        if self.executor.procs == 0 {
            anyhow::bail!("executor.procs must be at least 1");
        }

        if self.executor.no_run && self.executor.reset {
            anyhow::bail!("executor.no_run and executor.reset cannot both be set");
        }

        if matches!(&self.cache.dir, Some(dir) if dir.trim().is_empty()) {
            anyhow::bail!("cache.dir must not be empty when set");
        }

        Ok(())
    }
}
