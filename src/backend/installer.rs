//! Device/simulator installation collaborator.

use std::path::Path;

use anyhow::Result;

use crate::error::BuildError;
use crate::util::process::{combined_output, ProcessBuilder};

/// Installs and launches a built app bundle.
///
/// Only reached after a successful build, link, and bundle step; failures
/// surface unchanged as `InstallationFailed` / `LaunchFailed`.
pub trait Installer: Send + Sync {
    fn install(&self, bundle_path: &Path, bundle_id: &str) -> Result<()>;
    fn launch(&self, bundle_id: &str) -> Result<()>;
}

/// Installer driving the booted iOS simulator via `xcrun simctl`.
#[derive(Debug, Default)]
pub struct SimctlInstaller;

impl SimctlInstaller {
    pub fn new() -> Self {
        SimctlInstaller
    }
}

impl Installer for SimctlInstaller {
    fn install(&self, bundle_path: &Path, _bundle_id: &str) -> Result<()> {
        let output = ProcessBuilder::new("xcrun")
            .args(["simctl", "install", "booted"])
            .arg(bundle_path)
            .exec()?;

        if !output.status.success() {
            return Err(BuildError::InstallationFailed(combined_output(&output)).into());
        }

        tracing::info!("installed {} to simulator", bundle_path.display());
        Ok(())
    }

    fn launch(&self, bundle_id: &str) -> Result<()> {
        let output = ProcessBuilder::new("xcrun")
            .args(["simctl", "launch", "booted", bundle_id])
            .exec()?;

        if !output.status.success() {
            return Err(BuildError::LaunchFailed(combined_output(&output)).into());
        }

        tracing::info!("launched {} in simulator", bundle_id);
        Ok(())
    }
}
