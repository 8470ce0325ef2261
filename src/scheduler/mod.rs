//! Level-synchronized parallel build scheduling.
//!
//! The scheduler consumes a read-only [`DependencyGraph`], partitions the
//! module set into levels, fans each level out across a bounded worker
//! pool, and joins the whole level before the next one starts. The barrier
//! is load-bearing: a module at level L+1 may import interfaces that any
//! module at level <= L wrote to disk.

pub mod levels;
pub mod operation;
pub mod tracker;

pub use levels::LevelScheme;
pub use operation::BuildOutcome;
pub use tracker::{LevelStats, ParallelBuildTracker};

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::backend::{module_object_path, CompilerBackend, Installer, LinkRequest};
use crate::backend::bundle::create_app_bundle;
use crate::cache::ModuleCache;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::graph::DependencyGraph;
use crate::scheduler::operation::{HashRegistry, ModuleBuildOperation};
use crate::timing::BuildTimer;
use crate::util::fs::{ensure_dir, find_files_with_extension, remove_dir_all_if_exists};

/// Orchestrates a full or single-module build over one dependency graph.
pub struct BuildScheduler {
    graph: DependencyGraph,
    config: BuildConfig,
    backend: Arc<dyn CompilerBackend>,
    cache: ModuleCache,
    use_cache: bool,
    jobs: Option<usize>,
    level_scheme: LevelScheme,
    bundle: bool,
    timer: Arc<BuildTimer>,
    hashes: HashRegistry,
}

impl BuildScheduler {
    /// Create a scheduler. The graph must be fully constructed; it is
    /// treated as immutable from here on.
    pub fn new(
        graph: DependencyGraph,
        config: BuildConfig,
        backend: Arc<dyn CompilerBackend>,
        use_cache: bool,
    ) -> Result<Self> {
        let cache = ModuleCache::new(&config.cache_dir)?;
        Ok(BuildScheduler {
            graph,
            config,
            backend,
            cache,
            use_cache,
            jobs: None,
            level_scheme: LevelScheme::default(),
            bundle: false,
            timer: Arc::new(BuildTimer::new()),
            hashes: HashRegistry::new(),
        })
    }

    /// Cap the number of concurrent build tasks per level.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Choose how modules are partitioned into levels.
    pub fn with_level_scheme(mut self, scheme: LevelScheme) -> Self {
        self.level_scheme = scheme;
        self
    }

    /// Enable app bundle creation and signing after the final link.
    pub fn with_bundling(mut self, bundle: bool) -> Self {
        self.bundle = bundle;
        self
    }

    /// Timer handle for the current invocation.
    pub fn timer(&self) -> &BuildTimer {
        &self.timer
    }

    /// One global dependency-respecting sequence covering every module in
    /// the graph, deduplicated by first occurrence.
    pub fn compute_build_order(&self) -> Result<Vec<String>, BuildError> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();

        for module in self.graph.module_names() {
            for resolved in self.graph.resolve_dependencies(&module)? {
                if seen.insert(resolved.clone()) {
                    order.push(resolved);
                }
            }
        }

        Ok(order)
    }

    /// Partition `modules` into levels under the configured scheme.
    pub fn compute_levels(
        &self,
        modules: &[String],
    ) -> Result<BTreeMap<usize, BTreeSet<String>>, BuildError> {
        levels::compute_levels(&self.graph, modules, self.level_scheme)
    }

    /// Full pipeline: prepare directories, build every module level by
    /// level, link, and optionally bundle and install.
    pub fn build_app(&self, installer: Option<&dyn Installer>) -> Result<()> {
        self.timer.reset();
        self.timer.start("Total Build");

        self.timer.start("Prepare Directories");
        self.prepare_directories()?;
        self.timer.end("Prepare Directories");

        self.timer.start("Module Compilation");
        let order = self.compute_build_order()?;
        let levels = self.compute_levels(&order)?;
        let result = self.build_levels(&levels);
        self.timer.end("Module Compilation");
        result?;

        self.timer.start("Final Link");
        let executable = self.link_app(&order);
        self.timer.end("Final Link");
        let executable = executable?;

        if self.bundle {
            self.timer.start("Bundle Creation");
            let bundle_path = create_app_bundle(&self.config, &executable);
            self.timer.end("Bundle Creation");
            let bundle_path = bundle_path?;

            if let Some(installer) = installer {
                self.timer.start("Installation");
                let installed = installer
                    .install(&bundle_path, &self.config.bundle_id)
                    .and_then(|_| installer.launch(&self.config.bundle_id));
                self.timer.end("Installation");
                installed?;
            }
        }

        self.timer.end("Total Build");
        self.log_summary();
        Ok(())
    }

    /// Build one module plus its transitive dependencies. Dependencies go
    /// through the usual level fan-out; the target itself builds last, as
    /// a single sequential step.
    pub fn build_single_module(&self, target: &str) -> Result<()> {
        self.timer.reset();
        self.timer.start("Module Build");

        self.timer.start("Prepare Directories");
        self.prepare_directories()?;
        self.timer.end("Prepare Directories");

        self.timer.start("Dependency Resolution");
        let mut dependencies = self.graph.resolve_dependencies(target)?;
        dependencies.retain(|m| m != target);
        tracing::debug!("dependencies for {}: {:?}", target, dependencies);
        self.timer.end("Dependency Resolution");

        self.timer.start("Dependencies Compilation");
        let levels = self.compute_levels(&dependencies)?;
        let result = self.build_levels(&levels);
        self.timer.end("Dependencies Compilation");
        result?;

        self.timer.start("Target Module");
        let result = self.build_module(target);
        self.timer.end("Target Module");
        result?;

        self.timer.end("Module Build");
        self.log_summary();
        Ok(())
    }

    /// Build each level's modules concurrently, joining the level before
    /// the next starts. Every sibling in a failing level runs to
    /// completion; every failure is logged, the first is returned, and no
    /// further level is scheduled.
    pub fn build_levels(
        &self,
        levels: &BTreeMap<usize, BTreeSet<String>>,
    ) -> Result<Vec<BuildOutcome>> {
        let pool = self.thread_pool()?;
        let tracker = ParallelBuildTracker::new();
        let mut outcomes = Vec::new();

        tracing::info!("parallel build plan:");
        for (level, modules) in levels {
            tracing::info!(
                "level {}: {}",
                level,
                modules.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        let total: u64 = levels.values().map(|m| m.len() as u64).sum();
        let progress = ProgressBar::new(total);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for (&level, modules) in levels {
            let names: Vec<String> = modules.iter().cloned().collect();
            tracing::info!(
                "building level {} modules in parallel: {}",
                level,
                names.join(", ")
            );

            let results: Vec<(String, Result<BuildOutcome>)> = pool.install(|| {
                modules
                    .par_iter()
                    .map(|module| {
                        tracker.module_started(module);
                        let result = self.build_module(module);
                        tracker.module_finished(module);
                        progress.inc(1);
                        (module.clone(), result)
                    })
                    .collect()
            });

            tracker.take_level_stats(level).log();

            let mut first_error = None;
            for (module, result) in results {
                match result {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(error) => {
                        tracing::error!("module {} failed: {:#}", module, error);
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
            }

            if let Some(error) = first_error {
                return Err(error);
            }
        }

        progress.finish_and_clear();
        Ok(outcomes)
    }

    /// Build a single module through the cache and compiler backend.
    pub fn build_module(&self, module: &str) -> Result<BuildOutcome> {
        let operation = ModuleBuildOperation {
            module_name: module.to_string(),
            dependencies: self.graph.dependencies_of(module).to_vec(),
            config: &self.config,
            use_cache: self.use_cache,
            cache: &self.cache,
            backend: self.backend.as_ref(),
            hashes: &self.hashes,
            timer: &self.timer,
        };
        operation.execute()
    }

    fn link_app(&self, build_order: &[String]) -> Result<PathBuf> {
        let main_dir = self.config.source_dir.join("Sources");
        let main_sources = if main_dir.is_dir() {
            find_files_with_extension(&main_dir, "swift")?
        } else {
            Vec::new()
        };
        if main_sources.is_empty() {
            return Err(BuildError::compilation(
                &self.config.app_name,
                format!("no Swift files found in {}", main_dir.display()),
            )
            .into());
        }

        let output = self.config.build_dir.join(&self.config.app_name);
        let mut args = self.config.link_args(&output);
        let mut objects = Vec::new();

        for module in build_order {
            args.push("-I".to_string());
            args.push(self.config.module_build_dir(module).display().to_string());

            let object = module_object_path(&self.config.build_dir, module);
            if !object.exists() {
                return Err(BuildError::compilation(
                    &self.config.app_name,
                    format!("object file not found at path: {}", object.display()),
                )
                .into());
            }
            objects.push(object);
        }

        tracing::info!("linking {}", self.config.app_name);
        self.backend.link(&LinkRequest {
            object_files: objects,
            main_sources,
            compiler_args: args,
            output: output.clone(),
        })?;

        Ok(output)
    }

    fn prepare_directories(&self) -> Result<()> {
        remove_dir_all_if_exists(&self.config.build_dir)?;
        ensure_dir(&self.config.build_dir)
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        let jobs = self.jobs.unwrap_or_else(|| {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        });
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(Into::into)
    }

    fn log_summary(&self) {
        if let Some(summary) = self.timer.summarize() {
            tracing::info!("{}", summary);
        }
    }
}
