//! Named-phase build timing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A named-phase stopwatch for one build invocation.
///
/// Phases may nest and interleave (a "Module Compilation" phase containing
/// one phase per module). Updates arrive concurrently from build tasks, so
/// all state sits behind one mutex; the timer is shared by reference, never
/// through a global.
#[derive(Debug, Default)]
pub struct BuildTimer {
    inner: Mutex<TimerState>,
}

#[derive(Debug, Default)]
struct TimerState {
    active: HashMap<String, Instant>,
    measurements: Vec<(String, Duration)>,
}

impl BuildTimer {
    /// Create a timer with no recorded phases.
    pub fn new() -> Self {
        BuildTimer::default()
    }

    /// Begin timing a phase.
    pub fn start(&self, phase: impl Into<String>) {
        let mut state = self.lock();
        state.active.insert(phase.into(), Instant::now());
    }

    /// Finish timing a phase and record its duration. Ending a phase that
    /// was never started logs a warning and records nothing.
    pub fn end(&self, phase: &str) {
        let mut state = self.lock();
        match state.active.remove(phase) {
            Some(started) => {
                let duration = started.elapsed();
                state.measurements.push((phase.to_string(), duration));
                tracing::debug!("{} completed in {:.2}s", phase, duration.as_secs_f64());
            }
            None => {
                tracing::warn!("attempted to end timer for unknown phase: {}", phase);
            }
        }
    }

    /// Discard all state at the start of a new top-level build.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.active.clear();
        state.measurements.clear();
    }

    /// Recorded (phase, duration) measurements in completion order.
    pub fn measurements(&self) -> Vec<(String, Duration)> {
        self.lock().measurements.clone()
    }

    /// Render a summary of all completed phases, sorted by descending
    /// duration, each with its share of the total. Returns `None` when
    /// nothing was measured.
    pub fn summarize(&self) -> Option<String> {
        let measurements = self.measurements();
        if measurements.is_empty() {
            return None;
        }

        let total: Duration = measurements.iter().map(|(_, d)| *d).sum();
        let mut sorted = measurements;
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        let mut summary = String::from("\nBuild Summary:\n-------------");
        for (phase, duration) in &sorted {
            let percentage = if total.is_zero() {
                0.0
            } else {
                duration.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            summary.push_str(&format!(
                "\n{}: {:.2}s ({:.1}%)",
                phase,
                duration.as_secs_f64(),
                percentage
            ));
        }
        summary.push_str("\n-------------");
        summary.push_str(&format!("\nTotal Build Time: {:.2}s", total.as_secs_f64()));

        Some(summary)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
