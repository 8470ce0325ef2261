//! `slipway build` command

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::cli::BuildArgs;
use slipway::backend::{Installer, SimctlInstaller, SwiftcBackend};
use slipway::config::{load_dependency_graph, AppManifest, BuildConfig};
use slipway::scheduler::{BuildScheduler, LevelScheme};

pub fn execute(args: BuildArgs) -> Result<()> {
    if !args.source.is_dir() {
        bail!(
            "the specified project directory does not exist: {}",
            args.source.display()
        );
    }

    if args.clean {
        tracing::info!("performing clean build - module cache will be ignored");
    }

    let app = AppManifest::load(&args.source)?;
    tracing::debug!("app name: {}", app.app_name);
    tracing::debug!("modules: {:?}", app.modules);

    let graph = load_dependency_graph(&args.source, &app)
        .context("failed to build dependency graph")?;
    graph.validate()?;

    if let Some(ref module) = args.module {
        if !graph.contains(module) {
            bail!("module `{}` not found in dependency graph", module);
        }
    }

    let config = BuildConfig::new(&args.source, &app);
    let backend = Arc::new(SwiftcBackend::new()?);

    let level_scheme = if args.parity_levels {
        LevelScheme::DependencyCount
    } else {
        LevelScheme::CriticalPath
    };

    let scheduler = BuildScheduler::new(graph, config, backend, !args.clean)?
        .with_jobs(args.jobs)
        .with_level_scheme(level_scheme)
        .with_bundling(args.module.is_none());

    tracing::info!("starting build process...");
    match args.module {
        Some(module) => {
            scheduler.build_single_module(&module)?;
            tracing::info!("module `{}` built successfully!", module);
        }
        None => {
            let installer = SimctlInstaller::new();
            let installer: Option<&dyn Installer> = if args.skip_install {
                None
            } else {
                Some(&installer)
            };
            scheduler.build_app(installer)?;
            tracing::info!("app built successfully!");
        }
    }

    Ok(())
}
