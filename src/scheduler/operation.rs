//! The per-module unit of build work.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::Result;

use crate::backend::{module_artifacts, CompileRequest, CompilerBackend};
use crate::cache::ModuleCache;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::timing::BuildTimer;
use crate::util::fs::{
    ensure_dir, find_files_with_extension, normalize_path, remove_dir_all_if_exists,
};

/// Source-hash registry shared across build tasks.
///
/// A module's own source hash is recorded as soon as its key is computed,
/// whether the build is a cache hit or a fresh compile. Dependents in later
/// levels read these hashes to make their fingerprints transitively
/// content-sensitive. The level barrier guarantees a dependency's hash is
/// recorded before any dependent asks for it.
#[derive(Debug, Default)]
pub struct HashRegistry {
    hashes: Mutex<HashMap<String, String>>,
}

impl HashRegistry {
    pub fn new() -> Self {
        HashRegistry::default()
    }

    /// Record a module's source hash, replacing any previous value.
    pub fn record(&self, module: &str, hash: String) {
        self.lock().insert(module.to_string(), hash);
    }

    /// Hashes for the given modules, in name order. Modules without a
    /// recorded hash are omitted.
    pub fn snapshot(&self, modules: &[String]) -> BTreeMap<String, String> {
        let hashes = self.lock();
        modules
            .iter()
            .filter_map(|m| hashes.get(m).map(|h| (m.clone(), h.clone())))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.hashes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Result of one module build task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub module: String,
    /// True when artifacts were restored from cache without invoking the
    /// compiler backend.
    pub cache_hit: bool,
}

/// One schedulable build task: compile (or restore) a single module.
pub struct ModuleBuildOperation<'a> {
    pub module_name: String,
    pub dependencies: Vec<String>,
    pub config: &'a BuildConfig,
    pub use_cache: bool,
    pub cache: &'a ModuleCache,
    pub backend: &'a dyn CompilerBackend,
    pub hashes: &'a HashRegistry,
    pub timer: &'a BuildTimer,
}

impl ModuleBuildOperation<'_> {
    /// Execute the build task, timing it as its own phase.
    pub fn execute(&self) -> Result<BuildOutcome> {
        let phase = format!("Module: {}", self.module_name);
        self.timer.start(&phase);
        let result = self.build();
        self.timer.end(&phase);
        result
    }

    fn build(&self) -> Result<BuildOutcome> {
        let name = &self.module_name;
        let source_dir = normalize_path(&self.config.module_source_dir(name));
        let module_build_dir = self.config.module_build_dir(name);

        tracing::info!("building module at path: {}", source_dir.display());

        remove_dir_all_if_exists(&module_build_dir)?;
        ensure_dir(&module_build_dir)?;

        if !source_dir.is_dir() {
            return Err(BuildError::compilation(
                name,
                format!("no source directory at {}", source_dir.display()),
            )
            .into());
        }

        let sources = find_files_with_extension(&source_dir, "swift")?;
        if sources.is_empty() {
            return Err(BuildError::compilation(
                name,
                format!("no Swift files found in {}", source_dir.display()),
            )
            .into());
        }
        tracing::debug!("found source files: {:?}", sources);

        let request = CompileRequest {
            module_name: name.clone(),
            source_files: sources,
            include_dirs: self
                .dependencies
                .iter()
                .map(|dep| self.config.module_build_dir(dep))
                .collect(),
            compiler_args: self.config.module_compiler_args(name),
            output_dir: module_build_dir,
        };

        let dependency_hashes = self.hashes.snapshot(&self.dependencies);
        let key = self.cache.compute_key(
            name,
            &request.source_files,
            dependency_hashes,
            &request.full_args(),
        )?;
        self.hashes.record(name, key.source_hash.clone());

        if self.use_cache && self.cache.has_cached_module(&key) {
            tracing::info!("using cached version of module {}", name);
            self.cache.restore_module(&key, &self.config.build_dir)?;
            return Ok(BuildOutcome {
                module: name.clone(),
                cache_hit: true,
            });
        }

        self.backend.compile(&request)?;

        self.cache
            .cache_module(&key, &self.config.build_dir, &module_artifacts(name))?;

        Ok(BuildOutcome {
            module: name.clone(),
            cache_hit: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_snapshot_is_ordered_and_filtered() {
        let registry = HashRegistry::new();
        registry.record("B", "hash-b".to_string());
        registry.record("A", "hash-a".to_string());

        let snapshot = registry.snapshot(&[
            "B".to_string(),
            "A".to_string(),
            "Missing".to_string(),
        ]);

        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, ["A", "B"]);
        assert_eq!(snapshot["A"], "hash-a");
    }

    #[test]
    fn test_registry_record_overwrites() {
        let registry = HashRegistry::new();
        registry.record("A", "old".to_string());
        registry.record("A", "new".to_string());

        let snapshot = registry.snapshot(&["A".to_string()]);
        assert_eq!(snapshot["A"], "new");
    }
}
