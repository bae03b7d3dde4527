//! Content-addressed result cache
//!
//! Every (options, slot, salt) triple maps to one file under the cache root:
//! `<root>/<slot-dir>/<key>`, where `key` is the first 16 hex characters of a
//! SHA256 over the canonical command string, the slot and the salt. Captured
//! process output lives under the `stdout` slot directory.

pub mod cache_dir;

pub use cache_dir::default_cache_dir;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ExecutorError, Result};
use crate::pipeline::opts::Opts;

/// Slot directory used for captured process output.
pub const STDOUT_DIR: &str = "stdout";

pub struct Cache {
    root: PathBuf,
    in_flight: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl Cache {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ExecutorError::io(&root, e))?;

        Ok(Self {
            root,
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an entry relative to the cache root.
    ///
    /// Pure: the same arguments always give the same path, nothing is created.
    pub fn resolve_relative(&self, opts: &Opts, slot: Option<&str>, salt: u64) -> PathBuf {
        PathBuf::from(slot_dir(slot)).join(entry_key(opts, slot, salt))
    }

    /// Absolute path of an entry. The slot directory is created on first use.
    pub fn resolve_absolute(&self, opts: &Opts, slot: Option<&str>, salt: u64) -> Result<PathBuf> {
        let path = self.root.join(self.resolve_relative(opts, slot, salt));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExecutorError::io(parent, e))?;
        }
        Ok(path)
    }

    /// Block until no other holder owns `path`, then own it until the guard drops.
    ///
    /// Tasks hold this on their capture path while they check, execute and
    /// persist, so two jobs resolving the same entry never run it concurrently.
    pub fn lock(&self, path: &Path) -> PathLock<'_> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while in_flight.contains(path) {
            debug!(path = %path.display(), "waiting for cache entry");
            in_flight = self
                .released
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
        in_flight.insert(path.to_path_buf());

        PathLock {
            cache: self,
            path: path.to_path_buf(),
        }
    }

    /// Remove every entry, keeping the (empty) root.
    pub fn clean(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| ExecutorError::io(&self.root, e))?;
        }
        fs::create_dir_all(&self.root).map_err(|e| ExecutorError::io(&self.root, e))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats {
            cache_dir: self.root.clone(),
            ..CacheStats::default()
        };

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                ExecutorError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let size = entry
                .metadata()
                .map_err(|e| ExecutorError::io(entry.path(), e.into()))?
                .len();
            let slot = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();

            let slot_stats = stats.slots.entry(slot).or_default();
            slot_stats.entries += 1;
            slot_stats.size_bytes += size;
            stats.total_entries += 1;
            stats.total_size_bytes += size;
        }

        Ok(stats)
    }
}

/// Exclusive ownership of one cache path, released on drop.
pub struct PathLock<'a> {
    cache: &'a Cache,
    path: PathBuf,
}

impl Drop for PathLock<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .cache
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.remove(&self.path);
        self.cache.released.notify_all();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SlotStats {
    pub entries: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub cache_dir: PathBuf,
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub slots: BTreeMap<String, SlotStats>,
}

/// Hash identifying one cache entry.
pub fn entry_key(opts: &Opts, slot: Option<&str>, salt: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(opts.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(slot.unwrap_or(STDOUT_DIR).as_bytes());
    hasher.update([0u8]);
    hasher.update(salt.to_le_bytes());

    let hash = hex::encode(hasher.finalize());
    hash[..16].to_string()
}

/// Directory name for a slot: `--cache_file` becomes `cache_file`, `-f` becomes `f`.
fn slot_dir(slot: Option<&str>) -> String {
    let Some(slot) = slot else {
        return STDOUT_DIR.to_string();
    };
    let name: String = slot
        .trim_start_matches('-')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "slot".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn opts() -> Opts {
        Opts::parse("--cb_adf -l 0.1")
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let cache = Cache::new(temp.path()).unwrap();

        let first = cache.resolve_absolute(&opts(), Some("-f"), 42).unwrap();
        let second = cache.resolve_absolute(&opts(), Some("-f"), 42).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            cache.resolve_relative(&opts(), None, 42),
            cache.resolve_relative(&opts(), None, 42)
        );
    }

    #[test]
    fn test_relative_and_absolute_agree() {
        let temp = TempDir::new().unwrap();
        let cache = Cache::new(temp.path()).unwrap();

        let relative = cache.resolve_relative(&opts(), Some("--cache_file"), 7);
        let absolute = cache.resolve_absolute(&opts(), Some("--cache_file"), 7).unwrap();

        assert!(relative.starts_with("cache_file"));
        assert_eq!(absolute, temp.path().join(&relative));
        assert!(absolute.parent().unwrap().is_dir());
    }

    #[test]
    fn test_distinct_triples_get_distinct_paths() {
        let temp = TempDir::new().unwrap();
        let cache = Cache::new(temp.path()).unwrap();

        let base = cache.resolve_relative(&opts(), Some("-f"), 1);

        assert_ne!(base, cache.resolve_relative(&opts(), Some("-f"), 2));
        assert_ne!(base, cache.resolve_relative(&opts(), Some("-p"), 1));
        assert_ne!(
            base,
            cache.resolve_relative(&Opts::parse("--cb_adf -l 0.2"), Some("-f"), 1)
        );
        assert!(cache.resolve_relative(&opts(), None, 1).starts_with(STDOUT_DIR));
    }

    #[test]
    fn test_lock_serializes_same_path() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(Cache::new(temp.path()).unwrap());
        let path = temp.path().join("stdout/entry");
        let order = Arc::new(Mutex::new(Vec::new()));

        let guard = cache.lock(&path);
        let handle = {
            let cache = Arc::clone(&cache);
            let order = Arc::clone(&order);
            let path = path.clone();
            thread::spawn(move || {
                let _guard = cache.lock(&path);
                order.lock().unwrap().push("second");
            })
        };

        thread::sleep(Duration::from_millis(50));
        order.lock().unwrap().push("first");
        drop(guard);
        handle.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_stats_and_clean() {
        let temp = TempDir::new().unwrap();
        let cache = Cache::new(temp.path().join("cache")).unwrap();

        let model = cache.resolve_absolute(&opts(), Some("-f"), 1).unwrap();
        let stdout = cache.resolve_absolute(&opts(), None, 1).unwrap();
        fs::write(&model, b"model").unwrap();
        fs::write(&stdout, b"average loss = 0.5\n").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.slots["f"].entries, 1);
        assert_eq!(stats.slots[STDOUT_DIR].size_bytes, 19);

        cache.clean().unwrap();
        assert!(!model.exists());
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }
}
