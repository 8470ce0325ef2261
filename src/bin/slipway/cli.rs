//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Slipway - a module-level build orchestrator with content-addressed caching
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the app, or a single module and its dependencies
    Build(BuildArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Module cache maintenance
    Cache(CacheArgs),

    /// Display the resolved dependency graph
    Tree(TreeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// The project directory containing app.toml
    #[arg(short, long)]
    pub source: PathBuf,

    /// Build only this module and its dependencies
    #[arg(short, long)]
    pub module: Option<String>,

    /// Force a clean build, ignoring the module cache
    #[arg(long)]
    pub clean: bool,

    /// Number of parallel build jobs per level
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Partition levels by dependency-set size instead of dependency depth
    /// (matches the behavior of earlier releases)
    #[arg(long)]
    pub parity_levels: bool,

    /// Skip simulator installation and launch after a full build
    #[arg(long)]
    pub skip_install: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// The project directory to clean
    pub source: PathBuf,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove stale and corrupt cache entries
    Clean(CacheCleanArgs),
}

#[derive(Args)]
pub struct CacheCleanArgs {
    /// The project directory owning the cache
    #[arg(short, long)]
    pub source: PathBuf,

    /// Remove entries older than this many days
    #[arg(long, default_value_t = 7)]
    pub max_age_days: u64,
}

#[derive(Args)]
pub struct TreeArgs {
    /// The project directory containing app.toml
    #[arg(short, long)]
    pub source: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
