//! Content-addressed cache of built module artifacts.
//!
//! Layout on disk: `<cache_root>/<name>-<8 hex>/metadata.json` plus a
//! mirrored tree of the artifact files themselves. A metadata record that
//! cannot be read, or that references missing files, is treated as a cache
//! miss and eventually evicted rather than failing the build.

pub mod key;

pub use key::ModuleKey;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs::{copy_file, ensure_dir, remove_dir_all_if_exists};

/// Default retention for cache entries: one week.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Persisted record describing one cached module build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedModule {
    pub key: ModuleKey,
    /// Creation time, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Artifact paths relative to the build directory.
    pub artifacts: Vec<String>,
}

/// On-disk module cache.
///
/// The directory is shared mutable state; a per-key mutex map serializes
/// lookups, writes, and restores that target the same fingerprint within
/// this process. Cross-process callers must avoid overlapping builds of the
/// same key.
pub struct ModuleCache {
    cache_dir: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ModuleCache {
    /// Open (and create if needed) a cache rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        ensure_dir(&cache_dir)?;
        Ok(ModuleCache {
            cache_dir,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.cache_dir
    }

    /// Compute the fingerprint for a module build.
    pub fn compute_key(
        &self,
        name: &str,
        source_files: &[PathBuf],
        dependency_hashes: BTreeMap<String, String>,
        compiler_args: &[String],
    ) -> Result<ModuleKey> {
        ModuleKey::compute(name, source_files, dependency_hashes, compiler_args)
    }

    /// True only if a metadata record exists for `key` and every artifact
    /// it lists is still present on disk. Partial entries are misses.
    pub fn has_cached_module(&self, key: &ModuleKey) -> bool {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let entry_dir = self.entry_dir(key);

        let cached = match self.read_metadata(&entry_dir) {
            Ok(cached) => cached,
            Err(err) => {
                if entry_dir.exists() {
                    tracing::warn!(
                        "failed to read cache metadata for {}: {:#}",
                        key.name,
                        err
                    );
                }
                return false;
            }
        };

        cached
            .artifacts
            .iter()
            .all(|artifact| entry_dir.join(artifact).exists())
    }

    /// Persist a successful build. Any pre-existing entry for `key` is
    /// replaced wholesale. `artifacts` are paths relative to `build_dir`;
    /// their relative directory structure is preserved inside the entry.
    pub fn cache_module(
        &self,
        key: &ModuleKey,
        build_dir: &Path,
        artifacts: &[String],
    ) -> Result<()> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let entry_dir = self.entry_dir(key);

        remove_dir_all_if_exists(&entry_dir)?;
        ensure_dir(&entry_dir)?;

        for artifact in artifacts {
            copy_file(&build_dir.join(artifact), &entry_dir.join(artifact))?;
        }

        let cached = CachedModule {
            key: key.clone(),
            timestamp: unix_now(),
            artifacts: artifacts.to_vec(),
        };
        let json = serde_json::to_string_pretty(&cached)?;
        fs::write(entry_dir.join("metadata.json"), json).with_context(|| {
            format!("failed to write cache metadata for `{}`", key.name)
        })?;

        tracing::debug!(
            "cached module {} with {} artifacts",
            key.name,
            artifacts.len()
        );
        Ok(())
    }

    /// Copy every recorded artifact back into `build_dir` at the same
    /// relative path.
    pub fn restore_module(&self, key: &ModuleKey, build_dir: &Path) -> Result<()> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let entry_dir = self.entry_dir(key);
        let cached = self.read_metadata(&entry_dir)?;

        for artifact in &cached.artifacts {
            copy_file(&entry_dir.join(artifact), &build_dir.join(artifact))?;
        }

        tracing::debug!(
            "restored cached module {} with {} artifacts",
            key.name,
            cached.artifacts.len()
        );
        Ok(())
    }

    /// Evict entries with unreadable metadata and entries older than
    /// `max_age`. Returns the number of entries removed.
    pub fn clean(&self, max_age: Duration) -> Result<usize> {
        let cutoff = unix_now().saturating_sub(max_age.as_secs());
        let mut removed = 0;

        for entry in fs::read_dir(&self.cache_dir)
            .with_context(|| format!("failed to read cache dir: {}", self.cache_dir.display()))?
        {
            let entry_dir = entry?.path();
            if !entry_dir.is_dir() {
                continue;
            }

            match self.read_metadata(&entry_dir) {
                Ok(cached) if cached.timestamp >= cutoff => {}
                Ok(cached) => {
                    remove_dir_all_if_exists(&entry_dir)?;
                    removed += 1;
                    tracing::debug!("removed stale cache entry for {}", cached.key.name);
                }
                Err(_) => {
                    remove_dir_all_if_exists(&entry_dir)?;
                    removed += 1;
                    tracing::debug!(
                        "removed corrupt cache entry at {}",
                        entry_dir.display()
                    );
                }
            }
        }

        Ok(removed)
    }

    fn entry_dir(&self, key: &ModuleKey) -> PathBuf {
        self.cache_dir.join(key.cache_dir_name())
    }

    fn read_metadata(&self, entry_dir: &Path) -> Result<CachedModule> {
        let metadata_path = entry_dir.join("metadata.json");
        let data = fs::read_to_string(&metadata_path)
            .with_context(|| format!("failed to read {}", metadata_path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("malformed cache metadata: {}", metadata_path.display()))
    }

    /// Per-key mutex guarding concurrent cache operations on the same
    /// fingerprint. The returned Arc keeps the mutex alive while held.
    fn key_lock(&self, key: &ModuleKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.cache_dir_name()).or_default())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, ModuleCache, ModuleKey, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let cache = ModuleCache::new(tmp.path().join(".cache")).unwrap();

        let build_dir = tmp.path().join(".build");
        fs::create_dir_all(build_dir.join("Core")).unwrap();
        fs::write(build_dir.join("Core/Core.o"), "object bytes").unwrap();
        fs::write(build_dir.join("Core/Core.h"), "header bytes").unwrap();

        let source = tmp.path().join("Core.swift");
        fs::write(&source, "struct Core {}").unwrap();
        let key = ModuleKey::compute("Core", &[source], BTreeMap::new(), &[]).unwrap();

        (tmp, cache, key, build_dir)
    }

    fn artifacts() -> Vec<String> {
        vec!["Core/Core.o".to_string(), "Core/Core.h".to_string()]
    }

    #[test]
    fn test_round_trip_preserves_bytes() {
        let (tmp, cache, key, build_dir) = fixture();
        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();

        let fresh = tmp.path().join("fresh");
        fs::create_dir_all(&fresh).unwrap();
        cache.restore_module(&key, &fresh).unwrap();

        assert_eq!(
            fs::read(fresh.join("Core/Core.o")).unwrap(),
            fs::read(build_dir.join("Core/Core.o")).unwrap()
        );
        assert_eq!(
            fs::read(fresh.join("Core/Core.h")).unwrap(),
            fs::read(build_dir.join("Core/Core.h")).unwrap()
        );
    }

    #[test]
    fn test_has_cached_module() {
        let (_tmp, cache, key, build_dir) = fixture();
        assert!(!cache.has_cached_module(&key));

        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();
        assert!(cache.has_cached_module(&key));
    }

    #[test]
    fn test_missing_artifact_is_a_miss() {
        let (_tmp, cache, key, build_dir) = fixture();
        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();

        let entry = cache.root().join(key.cache_dir_name());
        fs::remove_file(entry.join("Core/Core.h")).unwrap();

        assert!(!cache.has_cached_module(&key));
    }

    #[test]
    fn test_corrupt_metadata_is_a_miss() {
        let (_tmp, cache, key, build_dir) = fixture();
        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();

        let entry = cache.root().join(key.cache_dir_name());
        fs::write(entry.join("metadata.json"), "{ not json").unwrap();

        assert!(!cache.has_cached_module(&key));
    }

    #[test]
    fn test_cache_module_replaces_existing_entry() {
        let (_tmp, cache, key, build_dir) = fixture();
        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();

        // Re-cache with a smaller artifact list; the old extra file must go.
        cache
            .cache_module(&key, &build_dir, &["Core/Core.o".to_string()])
            .unwrap();

        let entry = cache.root().join(key.cache_dir_name());
        assert!(entry.join("Core/Core.o").exists());
        assert!(!entry.join("Core/Core.h").exists());
    }

    #[test]
    fn test_clean_removes_corrupt_entries() {
        let (_tmp, cache, key, build_dir) = fixture();
        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();

        let bogus = cache.root().join("Bogus-deadbeef");
        fs::create_dir_all(&bogus).unwrap();
        fs::write(bogus.join("metadata.json"), "garbage").unwrap();

        let removed = cache.clean(DEFAULT_MAX_AGE).unwrap();
        assert_eq!(removed, 1);
        assert!(!bogus.exists());
        assert!(cache.has_cached_module(&key));
    }

    #[test]
    fn test_clean_removes_expired_entries() {
        let (_tmp, cache, key, build_dir) = fixture();
        cache.cache_module(&key, &build_dir, &artifacts()).unwrap();

        // Age the entry by rewriting its metadata timestamp.
        let metadata_path = cache
            .root()
            .join(key.cache_dir_name())
            .join("metadata.json");
        let mut cached: CachedModule =
            serde_json::from_str(&fs::read_to_string(&metadata_path).unwrap()).unwrap();
        cached.timestamp = 1;
        fs::write(&metadata_path, serde_json::to_string(&cached).unwrap()).unwrap();

        let removed = cache.clean(DEFAULT_MAX_AGE).unwrap();
        assert_eq!(removed, 1);
        assert!(!cache.has_cached_module(&key));
    }
}
