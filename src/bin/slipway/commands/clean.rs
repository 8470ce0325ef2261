//! `slipway clean` command

use anyhow::{bail, Result};

use crate::cli::CleanArgs;
use slipway::config::{AppManifest, BUILD_DIR};
use slipway::util::fs::remove_dir_all_if_exists;

pub fn execute(args: CleanArgs) -> Result<()> {
    if !args.source.is_dir() {
        bail!(
            "the specified project directory does not exist: {}",
            args.source.display()
        );
    }

    tracing::info!("cleaning build artifacts from {}", args.source.display());

    let app = AppManifest::load(&args.source)?;

    remove_dir_all_if_exists(&args.source.join(BUILD_DIR))?;

    // Stray compiler outputs sometimes land in the module directories
    // themselves; sweep those too.
    for module in &app.modules {
        let module_dir = args.source.join(module);
        let Ok(entries) = std::fs::read_dir(&module_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_stray = path
                .extension()
                .is_some_and(|ext| ext == "swiftmodule" || ext == "o");
            if is_stray {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::debug!("failed to remove {}: {}", path.display(), e);
                } else {
                    tracing::debug!("removed {}", path.display());
                }
            }
        }
    }

    tracing::info!("clean completed");
    Ok(())
}
