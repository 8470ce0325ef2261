//! `slipway tree` command

use anyhow::{bail, Result};

use crate::cli::TreeArgs;
use slipway::config::{load_dependency_graph, AppManifest};
use slipway::graph::DependencyGraph;

pub fn execute(args: TreeArgs) -> Result<()> {
    if !args.source.is_dir() {
        bail!(
            "the specified project directory does not exist: {}",
            args.source.display()
        );
    }

    let app = AppManifest::load(&args.source)?;
    let graph = load_dependency_graph(&args.source, &app)?;
    graph.validate()?;

    for root in &app.modules {
        print_subtree(&graph, root, 0);
    }

    Ok(())
}

fn print_subtree(graph: &DependencyGraph, module: &str, depth: usize) {
    println!("{}{}", "  ".repeat(depth), module);
    for dependency in graph.dependencies_of(module) {
        print_subtree(graph, dependency, depth + 1);
    }
}
