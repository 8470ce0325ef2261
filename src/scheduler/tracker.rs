//! Per-level parallelism instrumentation.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Statistics for one completed build level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelStats {
    pub level: usize,
    pub modules_built: usize,
    pub max_concurrent: usize,
    pub average_duration: Duration,
    pub max_duration: Duration,
    /// Wall-clock benefit of the parallel fan-out: sum of individual
    /// durations minus the longest one.
    pub time_saved: Duration,
}

/// Tracks the concurrent build tasks of the current level.
///
/// Build tasks report start/finish from worker threads; one mutex-guarded
/// owner serializes the updates. State is cleared when a level's statistics
/// are taken, so one tracker serves a whole multi-level run.
#[derive(Debug, Default)]
pub struct ParallelBuildTracker {
    inner: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    currently_building: HashSet<String>,
    max_concurrent: usize,
    build_times: HashMap<String, (Instant, Option<Instant>)>,
}

impl ParallelBuildTracker {
    /// Create an idle tracker.
    pub fn new() -> Self {
        ParallelBuildTracker::default()
    }

    /// Record that a module's build task has started.
    pub fn module_started(&self, module: &str) {
        let mut state = self.lock();
        state.currently_building.insert(module.to_string());
        state
            .build_times
            .insert(module.to_string(), (Instant::now(), None));
        state.max_concurrent = state.max_concurrent.max(state.currently_building.len());

        tracing::info!(
            "started building {} (currently building: {} modules)",
            module,
            state.currently_building.len()
        );
    }

    /// Record that a module's build task has finished (success or failure).
    pub fn module_finished(&self, module: &str) {
        let mut state = self.lock();
        state.currently_building.remove(module);
        if let Some(times) = state.build_times.get_mut(module) {
            times.1 = Some(Instant::now());
        }

        tracing::info!(
            "finished building {} (remaining: {} modules)",
            module,
            state.currently_building.len()
        );
    }

    /// Compute statistics for the finished level and clear all state for
    /// the next one. Modules without a recorded finish are skipped.
    pub fn take_level_stats(&self, level: usize) -> LevelStats {
        let mut state = self.lock();

        let mut total = Duration::ZERO;
        let mut max = Duration::ZERO;
        let mut count = 0;

        for (started, finished) in state.build_times.values() {
            if let Some(finished) = finished {
                let duration = finished.duration_since(*started);
                total += duration;
                max = max.max(duration);
                count += 1;
            }
        }

        let average = if count > 0 {
            total / count as u32
        } else {
            Duration::ZERO
        };

        let stats = LevelStats {
            level,
            modules_built: count,
            max_concurrent: state.max_concurrent,
            average_duration: average,
            max_duration: max,
            time_saved: total.saturating_sub(max),
        };

        state.build_times.clear();
        state.currently_building.clear();
        state.max_concurrent = 0;

        stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LevelStats {
    /// Log the level statistics at info level.
    pub fn log(&self) {
        tracing::info!(
            "level {} build statistics:\n\
             - modules built: {}\n\
             - maximum concurrent builds: {}\n\
             - average build time: {:.2}s\n\
             - maximum build time: {:.2}s\n\
             - time saved via parallelization: {:.2}s",
            self.level,
            self.modules_built,
            self.max_concurrent,
            self.average_duration.as_secs_f64(),
            self.max_duration.as_secs_f64(),
            self.time_saved.as_secs_f64()
        );
    }
}
