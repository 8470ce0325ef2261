//! Test utilities and mocks for slipway unit tests.
//!
//! Only compiled for tests. Provides an in-memory compiler backend and
//! on-disk project fixtures so scheduler and cache tests never need a real
//! toolchain.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;

use crate::backend::{module_artifacts, CompileRequest, CompilerBackend, LinkRequest};
use crate::config::{AppManifest, BuildConfig};
use crate::error::BuildError;
use crate::graph::DependencyGraph;

/// In-memory compiler backend.
///
/// `compile` writes the fixed artifact set under the build root so cache
/// writes and the final link behave exactly as with a real compiler, and
/// records the module name. Failures can be scripted per module.
#[derive(Debug, Default)]
pub struct MockBackend {
    compiled: Mutex<Vec<String>>,
    linked: Mutex<Vec<PathBuf>>,
    failing: HashSet<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend::default()
    }

    /// Make compilation of `module` fail with a scripted diagnostic.
    pub fn failing_module(mut self, module: &str) -> Self {
        self.failing.insert(module.to_string());
        self
    }

    /// Module names in the order their compilations finished.
    pub fn compiled(&self) -> Vec<String> {
        self.compiled.lock().unwrap().clone()
    }

    /// Number of compile invocations so far.
    pub fn compile_count(&self) -> usize {
        self.compiled.lock().unwrap().len()
    }

    /// Link outputs in invocation order.
    pub fn linked(&self) -> Vec<PathBuf> {
        self.linked.lock().unwrap().clone()
    }

    /// Number of link invocations so far.
    pub fn link_count(&self) -> usize {
        self.linked.lock().unwrap().len()
    }
}

impl CompilerBackend for MockBackend {
    fn compile(&self, request: &CompileRequest) -> Result<()> {
        if self.failing.contains(&request.module_name) {
            return Err(BuildError::compilation(
                &request.module_name,
                "scripted compile failure",
            )
            .into());
        }

        // Artifact paths are relative to the build root, one level above
        // the module's output directory.
        let build_root = request
            .output_dir
            .parent()
            .expect("module output dir must sit inside the build dir")
            .to_path_buf();

        for artifact in module_artifacts(&request.module_name) {
            let path = build_root.join(&artifact);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, format!("mock artifact: {}", artifact))?;
        }

        self.compiled
            .lock()
            .unwrap()
            .push(request.module_name.clone());
        Ok(())
    }

    fn link(&self, request: &LinkRequest) -> Result<()> {
        fs::write(&request.output, "mock executable")?;
        self.linked.lock().unwrap().push(request.output.clone());
        Ok(())
    }
}

/// Create an on-disk project with the given modules and dependency lists,
/// plus top-level program sources. Returns the temp dir (keep it alive),
/// the derived build config, and the dependency graph.
pub fn project_fixture(
    modules: &[(&str, &[&str])],
) -> (tempfile::TempDir, BuildConfig, DependencyGraph) {
    let tmp = tempfile::TempDir::new().unwrap();

    let roots: Vec<String> = modules.iter().map(|(name, _)| format!("\"{}\"", name)).collect();
    fs::write(
        tmp.path().join("app.toml"),
        format!(
            "app_name = \"Demo\"\nbundle_id = \"com.example.demo\"\nmodules = [{}]\n",
            roots.join(", ")
        ),
    )
    .unwrap();

    let main_dir = tmp.path().join("Sources");
    fs::create_dir_all(&main_dir).unwrap();
    fs::write(main_dir.join("main.swift"), "DemoApp.main()").unwrap();

    let mut graph = DependencyGraph::new();
    for (name, deps) in modules {
        let sources = tmp.path().join(name).join("Sources");
        fs::create_dir_all(&sources).unwrap();
        fs::write(
            sources.join(format!("{}.swift", name)),
            format!("public struct {} {{}}", name),
        )
        .unwrap();

        let dep_list: Vec<String> = deps.iter().map(|d| format!("\"{}\"", d)).collect();
        fs::write(
            tmp.path().join(name).join("module.toml"),
            format!(
                "module_name = \"{}\"\ndependencies = [{}]\n",
                name,
                dep_list.join(", ")
            ),
        )
        .unwrap();

        graph.add_module(*name, deps.iter().map(|d| d.to_string()).collect());
    }

    let app = AppManifest::load(tmp.path()).unwrap();
    let mut config = BuildConfig::new(tmp.path(), &app);
    // Fixtures never talk to a real SDK.
    config.sdk_path = None;

    (tmp, config, graph)
}
