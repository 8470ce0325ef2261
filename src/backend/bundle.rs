//! App bundle assembly and ad-hoc signing.
//!
//! Thin wrapper around platform tools: lays out `<App>.app`, writes the
//! bundle manifest, and signs the result. The orchestration core calls this
//! once, after the final link.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};
use crate::util::process::{combined_output, ProcessBuilder};

/// Assemble `<build>/<App>.app` from the linked executable, write its
/// `Info.plist`, and ad-hoc sign it. Returns the bundle path.
pub fn create_app_bundle(config: &BuildConfig, executable: &Path) -> Result<PathBuf> {
    let bundle_path = config.build_dir.join(format!("{}.app", config.app_name));

    remove_dir_all_if_exists(&bundle_path)?;
    ensure_dir(&bundle_path)?;

    let bundled_executable = bundle_path.join(&config.app_name);
    fs::rename(executable, &bundled_executable).with_context(|| {
        format!(
            "failed to move {} into {}",
            executable.display(),
            bundle_path.display()
        )
    })?;
    set_executable_permissions(&bundled_executable)?;

    fs::write(bundle_path.join("Info.plist"), info_plist(config))
        .context("failed to write Info.plist")?;

    sign_bundle(&bundle_path)?;

    Ok(bundle_path)
}

fn sign_bundle(bundle_path: &Path) -> Result<()> {
    let output = ProcessBuilder::new("codesign")
        .args([
            "--force",
            "--sign",
            "-",
            "--preserve-metadata=identifier,entitlements,flags",
            "--generate-entitlement-der",
        ])
        .arg(bundle_path)
        .exec()?;

    if !output.status.success() {
        return Err(BuildError::SigningFailed(combined_output(&output)).into());
    }

    Ok(())
}

fn info_plist(config: &BuildConfig) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleDevelopmentRegion</key>
	<string>en</string>
	<key>CFBundleExecutable</key>
	<string>{app}</string>
	<key>CFBundleIdentifier</key>
	<string>{bundle_id}</string>
	<key>CFBundleInfoDictionaryVersion</key>
	<string>6.0</string>
	<key>CFBundleName</key>
	<string>{app}</string>
	<key>CFBundlePackageType</key>
	<string>APPL</string>
	<key>MinimumOSVersion</key>
	<string>{target}</string>
	<key>UILaunchScreen</key>
	<dict/>
</dict>
</plist>
"#,
        app = config.app_name,
        bundle_id = config.bundle_id,
        target = config.deployment_target,
    )
}

#[cfg(unix)]
fn set_executable_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_executable_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppManifest;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> BuildConfig {
        let app: AppManifest = toml::from_str(
            r#"
app_name = "Demo"
bundle_id = "com.example.demo"
modules = []
"#,
        )
        .unwrap();
        BuildConfig::new(tmp.path(), &app)
    }

    #[test]
    fn test_info_plist_contains_identity() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);

        let plist = info_plist(&config);
        assert!(plist.contains("<string>Demo</string>"));
        assert!(plist.contains("<string>com.example.demo</string>"));
        assert!(plist.contains("MinimumOSVersion"));
    }
}
