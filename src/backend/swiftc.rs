//! Subprocess-backed Swift compiler driver.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::backend::{CompileRequest, CompilerBackend, LinkRequest};
use crate::error::BuildError;
use crate::util::fs::ensure_dir;
use crate::util::process::{combined_output, ProcessBuilder};

/// Name of the per-module output file map consumed by the compiler.
const OUTPUT_FILE_MAP: &str = "output-file-map.json";

/// Real compiler backend shelling out to `swiftc`.
pub struct SwiftcBackend {
    program: PathBuf,
}

impl SwiftcBackend {
    /// Locate `swiftc` on the PATH.
    pub fn new() -> Result<Self> {
        let program = which::which("swiftc")
            .context("could not locate `swiftc`; is a Swift toolchain installed?")?;
        Ok(SwiftcBackend { program })
    }

    /// Use an explicit compiler binary instead of PATH discovery.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        SwiftcBackend {
            program: program.into(),
        }
    }

    /// Single-object output mapping for whole-module compilation. The
    /// compiler resolves these names relative to its working directory.
    fn output_file_map(module: &str) -> String {
        format!(
            "{{\n  \"\": {{\n    \"object\": \"{}.o\",\n    \"swift-dependencies\": \"module.swiftdeps\"\n  }}\n}}\n",
            module
        )
    }
}

impl CompilerBackend for SwiftcBackend {
    fn compile(&self, request: &CompileRequest) -> Result<()> {
        ensure_dir(&request.output_dir)?;

        let map_path = request.output_dir.join(OUTPUT_FILE_MAP);
        std::fs::write(&map_path, Self::output_file_map(&request.module_name))
            .with_context(|| format!("failed to write {}", map_path.display()))?;

        let cmd = ProcessBuilder::new(&self.program)
            .args(request.full_args())
            .args(&request.source_files)
            .cwd(&request.output_dir);

        tracing::debug!(
            "compiling {}: {} {}",
            request.module_name,
            self.program.display(),
            cmd.get_args().join(" ")
        );

        let output = cmd.exec()?;
        if !output.status.success() {
            return Err(BuildError::compilation(
                &request.module_name,
                combined_output(&output),
            )
            .into());
        }

        tracing::debug!("compiler output:\n{}", combined_output(&output));
        Ok(())
    }

    fn link(&self, request: &LinkRequest) -> Result<()> {
        if let Some(parent) = request.output.parent() {
            ensure_dir(parent)?;
        }

        let cmd = ProcessBuilder::new(&self.program)
            .args(&request.compiler_args)
            .args(&request.object_files)
            .args(&request.main_sources);

        tracing::debug!(
            "linking {}: {} {}",
            request.output.display(),
            self.program.display(),
            cmd.get_args().join(" ")
        );

        let output = cmd.exec()?;
        if !output.status.success() {
            let target = request
                .output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| request.output.display().to_string());
            return Err(BuildError::compilation(target, combined_output(&output)).into());
        }

        Ok(())
    }
}
