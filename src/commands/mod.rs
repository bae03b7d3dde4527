pub mod cache;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::cli::CommonConfigArgs;
use vw_executor::pipeline::{Executor, Opts, ProgressHandler, Sweep, SweepTable};
use vw_executor::{load_config_with_discovery, Cache, ExecutorConfig};

/// Load the discovered (or explicit) config and apply command-line overrides
pub fn load_config(args: &CommonConfigArgs) -> Result<ExecutorConfig> {
    let mut config = load_config_with_discovery(args.config.as_deref())?.unwrap_or_default();

    if let Some(dir) = &args.cache_dir {
        config.cache.dir = Some(dir.clone());
    }
    if let Some(vw) = &args.vw {
        config.executor.vw = vw.clone();
    }
    if let Some(procs) = args.procs {
        config.executor.procs = procs;
    }
    config.executor.no_run |= args.no_run;
    config.executor.reset |= args.reset;

    config.validate()?;
    Ok(config)
}

pub fn open_cache(config: &ExecutorConfig) -> Result<Cache> {
    let dir = config.cache_dir();
    Cache::new(&dir).with_context(|| format!("Failed to open cache at {}", dir.display()))
}

pub fn build_executor(config: &ExecutorConfig) -> Result<Executor> {
    let cache = open_cache(config)?;
    let executor = Executor::new(&config.executor.vw, Arc::new(cache), config.executor.procs)
        .with_no_run(config.executor.no_run)
        .with_reset(config.executor.reset)
        .with_handler(Arc::new(ProgressHandler));

    tracing::debug!(
        cache_dir = %executor.cache().root().display(),
        vw = %config.executor.vw,
        procs = executor.pool().procs(),
        "executor configured"
    );
    Ok(executor)
}

/// One `--opts` gives a single job, several give a list, `--sweep` a table
pub fn build_sweep(opts: &[String], sweep: Option<&str>) -> Result<Sweep> {
    if let Some(path) = sweep {
        let table = SweepTable::from_file(Path::new(path))
            .with_context(|| format!("Failed to load sweep table: {}", path))?;
        return Ok(Sweep::Table(table));
    }

    Ok(match opts {
        [] => Sweep::Single(Opts::new()),
        [single] => Sweep::Single(Opts::parse(single)),
        many => Sweep::Points(many.iter().map(|o| Opts::parse(o)).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_sweep_shapes() {
        assert!(matches!(build_sweep(&[], None).unwrap(), Sweep::Single(o) if o.is_empty()));

        let single = build_sweep(&["--cb_adf -l 0.1".to_string()], None).unwrap();
        assert!(matches!(single, Sweep::Single(o) if o.len() == 2));

        let many = build_sweep(&["-l 0.1".to_string(), "-l 0.01".to_string()], None).unwrap();
        assert!(matches!(many, Sweep::Points(points) if points.len() == 2));
    }

    #[test]
    fn test_build_sweep_from_table_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sweep.json");
        fs::write(&path, r#"[{"-l": 0.1}, {"-l": 0.01}, {"-l": 0.001}]"#).unwrap();

        let sweep = build_sweep(&[], Some(path.to_str().unwrap())).unwrap();

        assert!(matches!(sweep, Sweep::Table(table) if table.len() == 3));
    }

    #[test]
    fn test_cli_overrides_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vw-executor.toml");
        fs::write(&path, "[executor]\nvw = \"/opt/vw\"\nprocs = 4\n").unwrap();

        let args = CommonConfigArgs {
            config: Some(path.to_string_lossy().to_string()),
            procs: Some(1),
            cache_dir: Some(temp.path().join("cache").to_string_lossy().to_string()),
            ..CommonConfigArgs::default()
        };
        let config = load_config(&args).unwrap();

        assert_eq!(config.executor.vw, "/opt/vw");
        assert_eq!(config.executor.procs, 1);
        assert_eq!(config.cache_dir(), temp.path().join("cache"));
    }
}
