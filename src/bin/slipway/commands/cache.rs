//! `slipway cache` commands

use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::{CacheArgs, CacheCommands};
use slipway::cache::ModuleCache;
use slipway::config::CACHE_DIR;

pub fn execute(args: CacheArgs) -> Result<()> {
    match args.command {
        CacheCommands::Clean(args) => {
            if !args.source.is_dir() {
                bail!(
                    "the specified project directory does not exist: {}",
                    args.source.display()
                );
            }

            let cache = ModuleCache::new(args.source.join(CACHE_DIR))?;
            let max_age = Duration::from_secs(args.max_age_days * 24 * 60 * 60);
            let removed = cache.clean(max_age)?;

            eprintln!("removed {} cache entries", removed);
            Ok(())
        }
    }
}
