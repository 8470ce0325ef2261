//! Module dependency graph.
//!
//! The graph is a plain adjacency list from module name to direct dependency
//! names. It is mutated only while the project manifests are being loaded;
//! during scheduling it is read-only and safely shared across build tasks.

use std::collections::{HashMap, HashSet};

use crate::error::BuildError;

/// Dependency graph over named modules.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    adjacency: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Register a module and its direct dependencies, overwriting any
    /// previous entry for the same name. No validation happens here.
    pub fn add_module(&mut self, name: impl Into<String>, dependencies: Vec<String>) {
        self.adjacency.insert(name.into(), dependencies);
    }

    /// Direct dependencies of a module. Empty for unknown modules.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.adjacency.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the module is registered in the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.adjacency.contains_key(name)
    }

    /// All registered module names, sorted for deterministic iteration.
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adjacency.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Resolve the full transitive dependency set of `name`,
    /// dependency-first: a module never appears before something it depends
    /// on, duplicates are removed by first occurrence, and `name` itself is
    /// last. Dependency names absent from the graph are treated as leaves
    /// and still appear in the result.
    pub fn resolve_dependencies(&self, name: &str) -> Result<Vec<String>, BuildError> {
        let mut resolved = Vec::new();
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();
        let mut path_stack = Vec::new();

        self.resolve(
            name,
            &mut resolved,
            &mut visited,
            &mut recursion_stack,
            &mut path_stack,
        )?;

        Ok(resolved)
    }

    fn resolve(
        &self,
        module: &str,
        resolved: &mut Vec<String>,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
        path_stack: &mut Vec<String>,
    ) -> Result<(), BuildError> {
        if recursion_stack.contains(module) {
            // The reported cycle is the current path from the first
            // occurrence of `module` through to this revisit, inclusive.
            let start = path_stack
                .iter()
                .position(|m| m == module)
                .unwrap_or(0);
            let mut cycle: Vec<String> = path_stack[start..].to_vec();
            cycle.push(module.to_string());
            return Err(BuildError::CyclicDependency(cycle));
        }

        if visited.contains(module) {
            return Ok(());
        }

        visited.insert(module.to_string());
        recursion_stack.insert(module.to_string());
        path_stack.push(module.to_string());

        if let Some(dependencies) = self.adjacency.get(module) {
            for dependency in dependencies {
                self.resolve(dependency, resolved, visited, recursion_stack, path_stack)?;
            }
        }

        path_stack.pop();
        recursion_stack.remove(module);
        resolved.push(module.to_string());

        Ok(())
    }

    /// Run the cycle check over every registered module, not just the ones
    /// reachable from some root, and collect a warning for each dependency
    /// name that is not itself registered. Warnings are non-fatal.
    pub fn validate(&self) -> Result<Vec<String>, BuildError> {
        for module in self.module_names() {
            self.resolve_dependencies(&module)?;
        }

        let mut warnings = Vec::new();
        for module in self.module_names() {
            for dependency in self.dependencies_of(&module) {
                if !self.contains(dependency) {
                    let warning = format!(
                        "module `{}` depends on `{}`, which is not declared in the graph",
                        module, dependency
                    );
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.add_module("A", vec![]);
        graph.add_module("B", vec!["A".to_string()]);
        graph.add_module("C", vec!["A".to_string()]);
        graph.add_module("D", vec!["B".to_string(), "C".to_string()]);
        graph
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|m| m == name).unwrap()
    }

    #[test]
    fn test_resolve_dependency_first() {
        let graph = diamond();
        let order = graph.resolve_dependencies("D").unwrap();

        assert_eq!(order.len(), 4);
        assert_eq!(order.last().unwrap(), "D");
        assert!(position(&order, "A") < position(&order, "B"));
        assert!(position(&order, "A") < position(&order, "C"));
        assert!(position(&order, "B") < position(&order, "D"));
        assert!(position(&order, "C") < position(&order, "D"));
    }

    #[test]
    fn test_resolve_no_duplicates() {
        let graph = diamond();
        let order = graph.resolve_dependencies("D").unwrap();

        let mut deduped = order.clone();
        deduped.dedup();
        assert_eq!(order, deduped);
        assert_eq!(order.iter().filter(|m| *m == "A").count(), 1);
    }

    #[test]
    fn test_resolve_leaf_module() {
        let graph = diamond();
        assert_eq!(graph.resolve_dependencies("A").unwrap(), vec!["A"]);
    }

    #[test]
    fn test_resolve_missing_dependency_is_leaf() {
        let mut graph = DependencyGraph::new();
        graph.add_module("App", vec!["Phantom".to_string()]);

        let order = graph.resolve_dependencies("App").unwrap();
        assert_eq!(order, vec!["Phantom", "App"]);
    }

    #[test]
    fn test_two_module_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_module("X", vec!["Y".to_string()]);
        graph.add_module("Y", vec!["X".to_string()]);

        let err = graph.resolve_dependencies("X").unwrap_err();
        match err {
            BuildError::CyclicDependency(path) => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"X".to_string()));
                assert!(path.contains(&"Y".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_path_is_suffix_of_traversal() {
        // E -> F -> G -> F: the reported cycle must start at F, not E.
        let mut graph = DependencyGraph::new();
        graph.add_module("E", vec!["F".to_string()]);
        graph.add_module("F", vec!["G".to_string()]);
        graph.add_module("G", vec!["F".to_string()]);

        let err = graph.resolve_dependencies("E").unwrap_err();
        match err {
            BuildError::CyclicDependency(path) => {
                assert_eq!(path, vec!["F", "G", "F"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_module("S", vec!["S".to_string()]);

        let err = graph.resolve_dependencies("S").unwrap_err();
        match err {
            BuildError::CyclicDependency(path) => assert_eq!(path, vec!["S", "S"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_dependency_not_reported_as_cycle() {
        // Diamonds revisit modules that are already fully resolved; that
        // must never be mistaken for a cycle.
        let graph = diamond();
        assert!(graph.resolve_dependencies("D").is_ok());
    }

    #[test]
    fn test_validate_reports_missing_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.add_module("App", vec!["Missing".to_string()]);
        graph.add_module("Lib", vec![]);

        let warnings = graph.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Missing"));
    }

    #[test]
    fn test_validate_detects_unreachable_cycle() {
        // The cycle is not reachable from `App`, but validate() walks every
        // registered module.
        let mut graph = DependencyGraph::new();
        graph.add_module("App", vec![]);
        graph.add_module("P", vec!["Q".to_string()]);
        graph.add_module("Q", vec!["P".to_string()]);

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_add_module_overwrites() {
        let mut graph = DependencyGraph::new();
        graph.add_module("M", vec!["A".to_string()]);
        graph.add_module("M", vec!["B".to_string()]);

        assert_eq!(graph.dependencies_of("M"), ["B".to_string()]);
        assert_eq!(graph.len(), 1);
    }
}
