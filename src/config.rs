//! Project configuration.
//!
//! A project is a directory containing `app.toml` plus one directory per
//! module, each with its own `module.toml` declaring direct dependencies.
//! Manifests are deserialized with serde; the dependency graph is assembled
//! by walking module manifests outward from the app's root modules.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::graph::DependencyGraph;

/// Directory name for build output, relative to the project root.
pub const BUILD_DIR: &str = ".build";

/// Directory name for the module cache, relative to the project root.
pub const CACHE_DIR: &str = ".cache";

/// Top-level application manifest (`app.toml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppManifest {
    /// Product name; also the name of the linked executable.
    pub app_name: String,

    /// Bundle identifier handed to the installer.
    pub bundle_id: String,

    /// Root modules; their transitive dependencies are discovered from
    /// module manifests.
    pub modules: Vec<String>,

    #[serde(default = "default_deployment_target")]
    pub deployment_target: String,

    #[serde(default = "default_swift_version", rename = "swift-version")]
    pub swift_version: String,

    #[serde(default = "default_resources_dir")]
    pub resources_dir: String,
}

fn default_deployment_target() -> String {
    "15.0".to_string()
}

fn default_swift_version() -> String {
    "5".to_string()
}

fn default_resources_dir() -> String {
    "Resources".to_string()
}

/// Per-module manifest (`<module>/module.toml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    pub module_name: String,

    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl AppManifest {
    /// Load `app.toml` from the project root.
    pub fn load(source_dir: &Path) -> Result<Self> {
        let path = source_dir.join("app.toml");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read app manifest: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse app manifest: {}", path.display()))
    }
}

impl ModuleManifest {
    /// Load `<module>/module.toml` from the project root.
    pub fn load(source_dir: &Path, module: &str) -> Result<Self> {
        let path = source_dir.join(module).join("module.toml");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read module manifest: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse module manifest: {}", path.display()))
    }
}

/// Assemble the dependency graph by recursively loading module manifests,
/// starting from the app's root modules.
pub fn load_dependency_graph(source_dir: &Path, app: &AppManifest) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    let mut processed = HashSet::new();
    let mut pending: Vec<String> = app.modules.clone();

    while let Some(module) = pending.pop() {
        if !processed.insert(module.clone()) {
            continue;
        }

        let manifest = ModuleManifest::load(source_dir, &module)?;
        tracing::debug!(
            "processing module {} (dependencies: {:?})",
            manifest.module_name,
            manifest.dependencies
        );

        pending.extend(manifest.dependencies.iter().cloned());
        graph.add_module(manifest.module_name, manifest.dependencies);
    }

    Ok(graph)
}

/// Resolved build settings for one invocation.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub app_name: String,
    pub bundle_id: String,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub deployment_target: String,
    pub swift_version: String,

    /// SDK handed to the compiler via `-sdk`; omitted when absent so tests
    /// and non-Darwin hosts can run with a bare toolchain.
    pub sdk_path: Option<PathBuf>,

    /// Target architecture slice, e.g. `arm64`.
    pub arch: String,
}

impl BuildConfig {
    /// Derive a build configuration from an app manifest rooted at
    /// `source_dir`.
    pub fn new(source_dir: impl Into<PathBuf>, app: &AppManifest) -> Self {
        let source_dir = source_dir.into();
        BuildConfig {
            app_name: app.app_name.clone(),
            bundle_id: app.bundle_id.clone(),
            build_dir: source_dir.join(BUILD_DIR),
            cache_dir: source_dir.join(CACHE_DIR),
            resources_dir: source_dir.join(&app.resources_dir),
            deployment_target: app.deployment_target.clone(),
            swift_version: app.swift_version.clone(),
            sdk_path: default_sdk_path(),
            arch: host_arch().to_string(),
            source_dir,
        }
    }

    /// Target triple for the simulator slice.
    pub fn target_triple(&self) -> String {
        format!(
            "{}-apple-ios{}-simulator",
            self.arch, self.deployment_target
        )
    }

    /// Directory holding a module's sources: `<source>/<module>/Sources`.
    pub fn module_source_dir(&self, module: &str) -> PathBuf {
        self.source_dir.join(module).join("Sources")
    }

    /// Per-module build output directory: `<build>/<module>`.
    pub fn module_build_dir(&self, module: &str) -> PathBuf {
        self.build_dir.join(module)
    }

    /// Base compiler argument template for building one module. Include
    /// paths for the module's dependencies are appended by the build
    /// operation; source files are appended by the backend.
    pub fn module_compiler_args(&self, module: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref sdk) = self.sdk_path {
            args.push("-sdk".to_string());
            args.push(sdk.display().to_string());
        }

        args.extend([
            "-target".to_string(),
            self.target_triple(),
            "-emit-module".to_string(),
            "-emit-module-path".to_string(),
            ".".to_string(),
            "-emit-dependencies".to_string(),
            "-emit-objc-header".to_string(),
            "-emit-objc-header-path".to_string(),
            format!("{}.h", module),
            "-module-name".to_string(),
            module.to_string(),
            "-parse-as-library".to_string(),
            "-c".to_string(),
            "-swift-version".to_string(),
            self.swift_version.clone(),
            "-whole-module-optimization".to_string(),
        ]);

        args
    }
}

impl BuildConfig {
    /// Argument template for the final link. Per-module import paths and
    /// object files are appended by the scheduler; main sources by the
    /// backend.
    pub fn link_args(&self, output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref sdk) = self.sdk_path {
            args.push("-sdk".to_string());
            args.push(sdk.display().to_string());
        }

        args.extend([
            "-target".to_string(),
            self.target_triple(),
            "-emit-executable".to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ]);

        if let Some(ref sdk) = self.sdk_path {
            args.extend([
                "-F".to_string(),
                sdk.join("System/Library/Frameworks").display().to_string(),
                "-framework".to_string(),
                "SwiftUI".to_string(),
                "-framework".to_string(),
                "Foundation".to_string(),
                "-framework".to_string(),
                "UIKit".to_string(),
            ]);
        }

        args.extend(["-swift-version".to_string(), self.swift_version.clone()]);
        args
    }
}

fn default_sdk_path() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from(
            "/Applications/Xcode.app/Contents/Developer/Platforms/iPhoneSimulator.platform/Developer/SDKs/iPhoneSimulator.sdk",
        ))
    } else {
        None
    }
}

fn host_arch() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}
