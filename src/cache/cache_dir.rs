use std::path::PathBuf;

/// Get default cache directory following platform conventions
///
/// - Linux/Unix: $XDG_CACHE_HOME/vw-executor or ~/.cache/vw-executor
/// - macOS: ~/Library/Caches/vw-executor
/// - Windows: %LOCALAPPDATA%/vw-executor
pub fn default_cache_dir() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join("vw-executor")
    } else {
        // No home directory: keep results next to the experiment
        PathBuf::from(".vw-executor/cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir() {
        let cache_dir = default_cache_dir();
        assert!(cache_dir.to_string_lossy().contains("vw-executor"));
    }
}
