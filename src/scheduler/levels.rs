//! Level partitioning of the module set.
//!
//! A level groups modules that may build concurrently: by construction no
//! module in a level depends on another module in the same level. Levels
//! execute in ascending order with a join barrier between them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::BuildError;
use crate::graph::DependencyGraph;

/// How modules are assigned to levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelScheme {
    /// Level = length of the module's resolved dependency list, including
    /// itself. A cardinality proxy for depth: a module with many shallow
    /// dependencies can land above one with fewer but deeper dependencies.
    /// Kept for behavioral parity with earlier releases.
    DependencyCount,

    /// Level = longest dependency chain from a leaf up to the module,
    /// inclusive. Modules are scheduled as early as their deepest
    /// dependency chain allows.
    #[default]
    CriticalPath,
}

impl std::str::FromStr for LevelScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(LevelScheme::DependencyCount),
            "depth" => Ok(LevelScheme::CriticalPath),
            other => Err(format!("unknown level scheme: `{}` (expected `count` or `depth`)", other)),
        }
    }
}

/// Partition `modules` into levels under the given scheme. Every module in
/// the input lands in exactly one level; modules with no dependencies land
/// in the lowest.
pub fn compute_levels(
    graph: &DependencyGraph,
    modules: &[String],
    scheme: LevelScheme,
) -> Result<BTreeMap<usize, BTreeSet<String>>, BuildError> {
    let mut levels: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    let mut depths: HashMap<String, usize> = HashMap::new();

    for module in modules {
        // Cycles surface here for either scheme; the depth recursion below
        // can then assume an acyclic graph.
        let resolved = graph.resolve_dependencies(module)?;

        let level = match scheme {
            LevelScheme::DependencyCount => resolved.len(),
            LevelScheme::CriticalPath => depth(graph, module, &mut depths),
        };

        levels.entry(level).or_default().insert(module.clone());
    }

    Ok(levels)
}

fn depth(graph: &DependencyGraph, module: &str, memo: &mut HashMap<String, usize>) -> usize {
    if let Some(&cached) = memo.get(module) {
        return cached;
    }

    let d = 1 + graph
        .dependencies_of(module)
        .iter()
        .map(|dep| depth(graph, dep, memo))
        .max()
        .unwrap_or(0);

    memo.insert(module.to_string(), d);
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (DependencyGraph, Vec<String>) {
        let mut graph = DependencyGraph::new();
        graph.add_module("A", vec![]);
        graph.add_module("B", vec!["A".to_string()]);
        graph.add_module("C", vec!["A".to_string()]);
        graph.add_module("D", vec!["B".to_string(), "C".to_string()]);
        let modules = vec!["A", "B", "C", "D"]
            .into_iter()
            .map(String::from)
            .collect();
        (graph, modules)
    }

    fn level_of(levels: &BTreeMap<usize, BTreeSet<String>>, module: &str) -> usize {
        *levels
            .iter()
            .find(|(_, set)| set.contains(module))
            .map(|(level, _)| level)
            .unwrap()
    }

    #[test]
    fn test_every_module_assigned_once() {
        let (graph, modules) = diamond();
        for scheme in [LevelScheme::DependencyCount, LevelScheme::CriticalPath] {
            let levels = compute_levels(&graph, &modules, scheme).unwrap();
            let total: usize = levels.values().map(|set| set.len()).sum();
            assert_eq!(total, modules.len());
        }
    }

    #[test]
    fn test_diamond_partition() {
        let (graph, modules) = diamond();
        for scheme in [LevelScheme::DependencyCount, LevelScheme::CriticalPath] {
            let levels = compute_levels(&graph, &modules, scheme).unwrap();

            // A alone at the lowest level, B and C together above it.
            let (lowest, first) = levels.iter().next().unwrap();
            assert_eq!(first.len(), 1);
            assert!(first.contains("A"));
            assert_eq!(level_of(&levels, "B"), level_of(&levels, "C"));
            assert!(level_of(&levels, "B") > *lowest);
            assert!(level_of(&levels, "D") > level_of(&levels, "B"));
        }
    }

    #[test]
    fn test_count_scheme_uses_cardinality() {
        let (graph, modules) = diamond();
        let levels = compute_levels(&graph, &modules, LevelScheme::DependencyCount).unwrap();

        // D resolves {A, B, C, D}: cardinality 4 even though its true depth
        // is 3.
        assert_eq!(level_of(&levels, "D"), 4);
    }

    #[test]
    fn test_critical_path_scheme_uses_depth() {
        let (graph, modules) = diamond();
        let levels = compute_levels(&graph, &modules, LevelScheme::CriticalPath).unwrap();
        assert_eq!(level_of(&levels, "D"), 3);
    }

    #[test]
    fn test_schemes_disagree_on_wide_shallow_graphs() {
        // W depends on four leaves; V on a two-deep chain. Cardinality puts
        // W (5) above V (3); true depth puts W (2) below V (3).
        let mut graph = DependencyGraph::new();
        for leaf in ["L1", "L2", "L3", "L4", "P"] {
            graph.add_module(leaf, vec![]);
        }
        graph.add_module("Q", vec!["P".to_string()]);
        graph.add_module(
            "W",
            vec!["L1", "L2", "L3", "L4"].into_iter().map(String::from).collect(),
        );
        graph.add_module("V", vec!["Q".to_string()]);
        let modules: Vec<String> = graph.module_names();

        let count = compute_levels(&graph, &modules, LevelScheme::DependencyCount).unwrap();
        assert!(level_of(&count, "W") > level_of(&count, "V"));

        let depth = compute_levels(&graph, &modules, LevelScheme::CriticalPath).unwrap();
        assert!(level_of(&depth, "W") < level_of(&depth, "V"));
    }

    #[test]
    fn test_cycle_propagates() {
        let mut graph = DependencyGraph::new();
        graph.add_module("X", vec!["Y".to_string()]);
        graph.add_module("Y", vec!["X".to_string()]);
        let modules = vec!["X".to_string(), "Y".to_string()];

        for scheme in [LevelScheme::DependencyCount, LevelScheme::CriticalPath] {
            assert!(matches!(
                compute_levels(&graph, &modules, scheme),
                Err(BuildError::CyclicDependency(_))
            ));
        }
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("count".parse::<LevelScheme>().unwrap(), LevelScheme::DependencyCount);
        assert_eq!("depth".parse::<LevelScheme>().unwrap(), LevelScheme::CriticalPath);
        assert!("fastest".parse::<LevelScheme>().is_err());
    }
}
