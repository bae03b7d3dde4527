use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::ExecutorConfig;

/// Project configuration file name
pub const CONFIG_FILE: &str = "vw-executor.toml";

/// Discovers configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        // Try to go up one level
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    // Fallback to global config
    if let Some(home) = dirs::home_dir() {
        let global_config = home.join(".config/vw-executor/config.toml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd.
///
/// Returns Ok(None) if no config is found (neither explicit nor discovered).
pub fn load_config_with_discovery(explicit_path: Option<&str>) -> Result<Option<ExecutorConfig>> {
    if let Some(config_path) = explicit_path {
        return Ok(Some(ExecutorConfig::from_file(config_path)?));
    }

    let current_dir = std::env::current_dir()
        .context("Failed to get current directory for config discovery")?;

    match discover_config(&current_dir)? {
        Some(discovered_path) => {
            tracing::debug!(path = %discovered_path.display(), "using discovered config");
            Ok(Some(ExecutorConfig::from_file(&discovered_path)?))
        }
        None => Ok(None),
    }
}
