//! Dependency graph construction over check definitions.
//!
//! The batcher takes the checks of a job, validates their `depends_on` lists and
//! builds a directed acyclic graph with an edge from each dependency to its
//! dependent. Validation happens before anything runs: an unknown id or a
//! cycle rejects the whole plan.

use crate::check::CheckDefinition;
use crate::dag::plan::{Batch, ExecutionPlan};
use crate::errors::BatchError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Index into the check list.
pub type CheckIndex = usize;

/// A directed acyclic graph of checks.
#[derive(Debug)]
pub struct CheckGraph {
    /// Checks indexed by their position in the input
    checks: Vec<Arc<CheckDefinition>>,
    /// Map from check id to index
    index_map: HashMap<String, CheckIndex>,
    /// Forward edges: index -> checks that depend on it
    forward_edges: Vec<Vec<CheckIndex>>,
    /// Reverse edges: index -> checks it depends on
    reverse_edges: Vec<Vec<CheckIndex>>,
}

impl CheckGraph {
    /// Get the number of checks in the graph.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Get a check by its id.
    pub fn get(&self, id: &str) -> Option<&Arc<CheckDefinition>> {
        self.index_map.get(id).and_then(|&i| self.checks.get(i))
    }

    /// Get the index for a check id.
    pub fn get_index(&self, id: &str) -> Option<CheckIndex> {
        self.index_map.get(id).copied()
    }

    /// Get checks that depend on the given check (forward edges).
    pub fn dependents(&self, index: CheckIndex) -> &[CheckIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Get checks that the given check depends on (reverse edges).
    pub fn dependencies(&self, index: CheckIndex) -> &[CheckIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Check if all dependencies of a check are in `placed`.
    pub fn dependencies_satisfied(&self, index: CheckIndex, placed: &HashSet<CheckIndex>) -> bool {
        self.dependencies(index)
            .iter()
            .all(|dep| placed.contains(dep))
    }

    /// Group checks into batches.
    ///
    /// Each batch holds every not-yet-placed check whose dependencies all sit in
    /// earlier batches, in input order. A check therefore never lands in a batch
    /// before any of its dependencies, and independent checks share a batch.
    pub fn batches(&self) -> ExecutionPlan {
        let mut batches = Vec::new();
        let mut placed: HashSet<CheckIndex> = HashSet::new();

        loop {
            let ready: Vec<CheckIndex> = (0..self.checks.len())
                .filter(|i| !placed.contains(i) && self.dependencies_satisfied(*i, &placed))
                .collect();

            if ready.is_empty() {
                break;
            }

            placed.extend(ready.iter().copied());
            batches.push(Batch::new(
                ready.iter().map(|&i| Arc::clone(&self.checks[i])).collect(),
            ));
        }

        ExecutionPlan::new(batches)
    }
}

/// Builds the dependency graph and execution plan for a set of checks.
pub struct Batcher {
    checks: Vec<Arc<CheckDefinition>>,
}

impl Batcher {
    /// Create a batcher over the given checks.
    pub fn new(checks: Vec<Arc<CheckDefinition>>) -> Self {
        Self { checks }
    }

    /// Validate the checks and compute the batch order in one go.
    pub fn plan(checks: Vec<Arc<CheckDefinition>>) -> Result<ExecutionPlan, BatchError> {
        Ok(Self::new(checks).build()?.batches())
    }

    /// Build the check graph.
    ///
    /// This validates the graph structure:
    /// - Check ids must be unique
    /// - All dependencies must reference checks in the list
    /// - No cycles are allowed
    pub fn build(self) -> Result<CheckGraph, BatchError> {
        let mut index_map = HashMap::new();
        for (i, check) in self.checks.iter().enumerate() {
            if index_map.insert(check.id().to_string(), i).is_some() {
                return Err(BatchError::DuplicateCheck {
                    id: check.id().to_string(),
                });
            }
        }

        let mut forward_edges: Vec<Vec<CheckIndex>> = vec![Vec::new(); self.checks.len()];
        let mut reverse_edges: Vec<Vec<CheckIndex>> = vec![Vec::new(); self.checks.len()];

        for (to_idx, check) in self.checks.iter().enumerate() {
            for dep in check.depends_on() {
                let from_idx =
                    *index_map
                        .get(dep)
                        .ok_or_else(|| BatchError::UnknownDependency {
                            check: check.id().to_string(),
                            dependency: dep.clone(),
                        })?;

                // Edge: from_idx must finish before to_idx
                forward_edges[from_idx].push(to_idx);
                reverse_edges[to_idx].push(from_idx);
            }
        }

        let graph = CheckGraph {
            checks: self.checks,
            index_map,
            forward_edges,
            reverse_edges,
        };

        Self::validate_no_cycles(&graph)?;

        Ok(graph)
    }

    /// Validate that the graph has no cycles using Kahn's algorithm.
    fn validate_no_cycles(graph: &CheckGraph) -> Result<(), BatchError> {
        let mut in_degree: Vec<usize> = graph.reverse_edges.iter().map(Vec::len).collect();

        let mut queue: Vec<CheckIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;

        while let Some(node) = queue.pop() {
            processed += 1;

            for &dependent in graph.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if processed != graph.len() {
            let checks: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| graph.checks[i].id().to_string())
                .collect();

            return Err(BatchError::CircularDependency { checks });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, deps: Vec<&str>) -> Arc<CheckDefinition> {
        Arc::new(CheckDefinition::builder(id).depends_on(deps).build())
    }

    #[test]
    fn test_build_simple_graph() {
        let graph = Batcher::new(vec![
            check("a", vec![]),
            check("b", vec!["a"]),
            check("c", vec!["a"]),
            check("d", vec!["b", "c"]),
        ])
        .build()
        .unwrap();

        assert_eq!(graph.len(), 4);
        assert!(graph.dependencies(0).is_empty());
        assert_eq!(graph.dependencies(3), &[1, 2]);
        let dependents = graph.dependents(0);
        assert!(dependents.contains(&1));
        assert!(dependents.contains(&2));
        assert_eq!(graph.get("c").map(|c| c.id()), Some("c"));
    }

    #[test]
    fn test_batches_diamond() {
        let plan = Batcher::plan(vec![
            check("a", vec![]),
            check("b", vec!["a"]),
            check("c", vec!["a"]),
            check("d", vec!["b", "c"]),
        ])
        .unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.batches()[0].ids(), vec!["a"]);
        assert_eq!(plan.batches()[1].ids(), vec!["b", "c"]);
        assert_eq!(plan.batches()[2].ids(), vec!["d"]);
    }

    #[test]
    fn test_batches_dependency_declared_after_dependent() {
        let plan = Batcher::plan(vec![check("late", vec!["early"]), check("early", vec![])]).unwrap();

        assert_eq!(plan.position_of("early"), Some(0));
        assert_eq!(plan.position_of("late"), Some(1));
    }

    #[test]
    fn test_independent_checks_share_a_batch() {
        let plan = Batcher::plan(vec![check("x", vec![]), check("y", vec![])]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.batches()[0].ids(), vec!["x", "y"]);
    }

    #[test]
    fn test_cycle_detection() {
        let result = Batcher::new(vec![
            check("a", vec!["c"]),
            check("b", vec!["a"]),
            check("c", vec!["b"]),
            check("free", vec![]),
        ])
        .build();

        match result {
            Err(BatchError::CircularDependency { checks }) => {
                assert_eq!(checks, vec!["a", "b", "c"]);
            }
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let result = Batcher::plan(vec![check("loop", vec!["loop"])]);
        assert!(matches!(result, Err(BatchError::CircularDependency { .. })));
    }

    #[test]
    fn test_missing_dependency() {
        let result = Batcher::new(vec![check("a", vec!["nonexistent"])]).build();

        match result {
            Err(BatchError::UnknownDependency { check, dependency }) => {
                assert_eq!(check, "a");
                assert_eq!(dependency, "nonexistent");
            }
            other => panic!("Expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_check_id() {
        let result = Batcher::new(vec![check("a", vec![]), check("a", vec![])]).build();
        assert!(matches!(result, Err(BatchError::DuplicateCheck { id }) if id == "a"));
    }

    #[test]
    fn test_empty_graph() {
        let graph = Batcher::new(vec![]).build().unwrap();
        assert!(graph.is_empty());
        assert!(graph.batches().is_empty());
    }

    #[test]
    fn test_dependencies_satisfied() {
        let graph = Batcher::new(vec![
            check("a", vec![]),
            check("b", vec!["a"]),
            check("c", vec!["a", "b"]),
        ])
        .build()
        .unwrap();
        let mut placed = HashSet::new();

        assert!(graph.dependencies_satisfied(0, &placed));
        assert!(!graph.dependencies_satisfied(1, &placed));

        placed.insert(0);
        assert!(graph.dependencies_satisfied(1, &placed));
        assert!(!graph.dependencies_satisfied(2, &placed));

        placed.insert(1);
        assert!(graph.dependencies_satisfied(2, &placed));
    }
}
