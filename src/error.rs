//! Build error types.
//!
//! `BuildError` is the domain error for the orchestrator's core operations:
//! dependency-graph resolution and the compile/link/sign/install pipeline.
//! I/O and other ambient failures stay on the `anyhow` path; these variants
//! are the ones callers pattern-match on. Modeled on Mason's
//! `BuildError.swift` (same variants and cycle rendering) using the
//! `thiserror` enum style from the teacher's resolver errors.

use thiserror::Error;

/// A failure in the build pipeline or dependency graph.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A dependency cycle was detected. The path is the suffix of the
    /// traversal from the first occurrence of the revisited module through
    /// the current module, inclusive (so the first and last names match).
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Compiling or linking a module/target failed. `module` names the unit
    /// that failed; `detail` carries the captured compiler diagnostics.
    #[error("compilation of `{module}` failed: {detail}")]
    CompilationFailed { module: String, detail: String },

    /// Code signing the bundled product failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Installing the product onto the target failed.
    #[error("installation failed: {0}")]
    InstallationFailed(String),

    /// Launching the installed product failed.
    #[error("launch failed: {0}")]
    LaunchFailed(String),
}

impl BuildError {
    /// Construct a [`BuildError::CompilationFailed`] from a module name and
    /// its captured diagnostics.
    pub fn compilation(module: impl Into<String>, detail: impl Into<String>) -> Self {
        BuildError::CompilationFailed {
            module: module.into(),
            detail: detail.into(),
        }
    }
}
