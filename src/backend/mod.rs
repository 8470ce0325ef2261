//! Compiler backend contract.
//!
//! The orchestration core never shells out to a compiler directly; it goes
//! through the narrow [`CompilerBackend`] trait so tests can substitute an
//! in-memory implementation. The real implementation lives in
//! [`swiftc::SwiftcBackend`].

pub mod bundle;
pub mod installer;
pub mod swiftc;

pub use installer::{Installer, SimctlInstaller};
pub use swiftc::SwiftcBackend;

use std::path::PathBuf;

use anyhow::Result;

/// One module compilation job.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Module being compiled.
    pub module_name: String,

    /// The module's own source files.
    pub source_files: Vec<PathBuf>,

    /// Build output directories of the module's direct dependencies,
    /// exposed to the compiler as import search paths.
    pub include_dirs: Vec<PathBuf>,

    /// Base compiler arguments (everything except search paths and
    /// sources).
    pub compiler_args: Vec<String>,

    /// Directory the compiler runs in and writes artifacts to.
    pub output_dir: PathBuf,
}

impl CompileRequest {
    /// The complete argument list as handed to the compiler: base args
    /// followed by one `-I` pair per dependency include dir. This is also
    /// the canonical argument list for cache fingerprinting, so command
    /// construction and fingerprinting can never drift apart.
    pub fn full_args(&self) -> Vec<String> {
        let mut args = self.compiler_args.clone();
        for dir in &self.include_dirs {
            args.push("-I".to_string());
            args.push(dir.display().to_string());
        }
        args
    }
}

/// One link job producing the final executable.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    /// Object files of every built module, dependency-first.
    pub object_files: Vec<PathBuf>,

    /// Top-level program sources compiled alongside the link.
    pub main_sources: Vec<PathBuf>,

    /// Complete linker/compiler argument list.
    pub compiler_args: Vec<String>,

    /// Path of the linked executable.
    pub output: PathBuf,
}

/// External compiler toolchain.
///
/// Implementations must be shareable across the scheduler's worker threads.
/// Failures surface as [`crate::error::BuildError::CompilationFailed`] with
/// the compiler's diagnostic output attached.
pub trait CompilerBackend: Send + Sync {
    /// Compile one module, producing the fixed artifact set in
    /// `output_dir`.
    fn compile(&self, request: &CompileRequest) -> Result<()>;

    /// Link module objects and main sources into the final executable.
    fn link(&self, request: &LinkRequest) -> Result<()>;
}

/// The fixed artifact set a module build leaves behind, as paths relative
/// to the build root: module interface, generated header, object file,
/// dependency files, and the module dependency-tracking file.
pub fn module_artifacts(module: &str) -> Vec<String> {
    vec![
        format!("{}/{}.swiftmodule", module, module),
        format!("{}/{}.h", module, module),
        format!("{}/{}.o", module, module),
        format!("{}/{}.d", module, module),
        format!("{}/{}.emit-module.d", module, module),
        format!("{}/module.swiftdeps", module),
    ]
}

/// The object file a module build contributes to the final link.
pub fn module_object_path(build_dir: &std::path::Path, module: &str) -> PathBuf {
    build_dir.join(module).join(format!("{}.o", module))
}
