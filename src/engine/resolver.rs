//! Dependency resolution for plan operations.
//!
//! Builds a dependency graph from the operations that declare an `id` and
//! produces a total execution order consistent with every `dependsOn` edge.
//! Operations without an id cannot be depended upon; they run first, in
//! their original relative order. Cycles are rejected before any mutation
//! happens.

use crate::error::EngineError;
use crate::plan::Operation;
use std::collections::HashMap;

/// How to treat a `dependsOn` id that matches no operation in the plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownDependencyPolicy {
    /// Log a warning and treat the dependency as already satisfied
    #[default]
    Warn,
    /// Fail the plan before execution
    Fail,
}

/// Three-state marking for the depth-first topological sort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders plan operations so every dependency runs before its dependents
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    policy: UnknownDependencyPolicy,
}

impl DependencyResolver {
    pub fn new(policy: UnknownDependencyPolicy) -> Self {
        Self { policy }
    }

    /// Resolve an execution order over `ops`, returned as indices into the
    /// original slice.
    ///
    /// The id-free prefix keeps submission order. Id-bearing operations are
    /// ordered by a depth-first topological sort: roots are visited in
    /// submission order and dependencies in listed `dependsOn` order, so
    /// ties always break toward the original array position.
    ///
    /// # Errors
    /// * `CyclicDependency` naming the id where a back-edge was found
    /// * `UnknownDependency` under [`UnknownDependencyPolicy::Fail`]
    pub fn resolve(&self, ops: &[Operation]) -> Result<Vec<usize>, EngineError> {
        let mut order: Vec<usize> = Vec::with_capacity(ops.len());
        let mut id_to_index: HashMap<&str, usize> = HashMap::new();

        // Id-free operations form an unconditional prefix.
        for (i, op) in ops.iter().enumerate() {
            match op.id.as_deref() {
                Some(id) => {
                    id_to_index.insert(id, i);
                }
                None => order.push(i),
            }
        }

        let mut marks = vec![Mark::Unvisited; ops.len()];
        for (i, op) in ops.iter().enumerate() {
            if op.id.is_some() && marks[i] == Mark::Unvisited {
                self.visit(i, ops, &id_to_index, &mut marks, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        index: usize,
        ops: &[Operation],
        id_to_index: &HashMap<&str, usize>,
        marks: &mut Vec<Mark>,
        order: &mut Vec<usize>,
    ) -> Result<(), EngineError> {
        marks[index] = Mark::InProgress;

        for dep_id in &ops[index].depends_on {
            match id_to_index.get(dep_id.as_str()) {
                Some(&dep_index) => match marks[dep_index] {
                    // Back-edge to a node still on the DFS stack: cycle.
                    Mark::InProgress => {
                        return Err(EngineError::CyclicDependency {
                            id: dep_id.clone(),
                        });
                    }
                    Mark::Unvisited => {
                        self.visit(dep_index, ops, id_to_index, marks, order)?;
                    }
                    Mark::Done => {}
                },
                None => match self.policy {
                    UnknownDependencyPolicy::Warn => {
                        tracing::warn!(
                            operation = %ops[index].id_for_display(),
                            missing = %dep_id,
                            "Unknown dependency id, treating as satisfied"
                        );
                    }
                    UnknownDependencyPolicy::Fail => {
                        return Err(EngineError::UnknownDependency {
                            id: ops[index].id_for_display().to_string(),
                            missing: dep_id.clone(),
                        });
                    }
                },
            }
        }

        marks[index] = Mark::Done;
        order.push(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OperationKind;

    fn op(id: Option<&str>, deps: &[&str]) -> Operation {
        let mut o = Operation::new(OperationKind::ClearRange {
            range: format!("Sheet1!{}", id.unwrap_or("Z99")),
        });
        o.id = id.map(|s| s.to_string());
        o.depends_on = deps.iter().map(|s| s.to_string()).collect();
        o
    }

    fn resolve(ops: &[Operation]) -> Result<Vec<usize>, EngineError> {
        DependencyResolver::default().resolve(ops)
    }

    #[test]
    fn test_no_ids_keeps_submission_order() {
        let ops = vec![op(None, &[]), op(None, &[]), op(None, &[])];
        assert_eq!(resolve(&ops).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dependencies_reorder_operations() {
        // Submitted [c, a, b] with c -> b -> a; must execute a, b, c.
        let ops = vec![op(Some("c"), &["b"]), op(Some("a"), &[]), op(Some("b"), &["a"])];
        assert_eq!(resolve(&ops).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_every_dependency_precedes_its_dependent() {
        let ops = vec![
            op(Some("d"), &["b", "c"]),
            op(Some("b"), &["a"]),
            op(Some("c"), &["a"]),
            op(Some("a"), &[]),
        ];
        let order = resolve(&ops).unwrap();
        let position: HashMap<usize, usize> =
            order.iter().enumerate().map(|(pos, &i)| (i, pos)).collect();
        for (i, o) in ops.iter().enumerate() {
            for dep in &o.depends_on {
                let j = ops.iter().position(|x| x.id.as_deref() == Some(dep)).unwrap();
                assert!(position[&j] < position[&i], "{} must precede {:?}", dep, o.id);
            }
        }
    }

    #[test]
    fn test_id_free_prefix_precedes_id_bearing() {
        let ops = vec![op(Some("a"), &[]), op(None, &[]), op(None, &[])];
        assert_eq!(resolve(&ops).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_two_node_cycle_is_rejected() {
        let ops = vec![op(Some("a"), &["b"]), op(Some("b"), &["a"])];
        let err = resolve(&ops).unwrap_err();
        assert!(matches!(err, EngineError::CyclicDependency { .. }));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let ops = vec![op(Some("a"), &["a"])];
        let err = resolve(&ops).unwrap_err();
        assert_eq!(err, EngineError::CyclicDependency { id: "a".to_string() });
    }

    #[test]
    fn test_unknown_dependency_is_permissive_by_default() {
        let ops = vec![op(Some("a"), &["ghost"])];
        assert_eq!(resolve(&ops).unwrap(), vec![0]);
    }

    #[test]
    fn test_unknown_dependency_fails_under_strict_policy() {
        let ops = vec![op(Some("a"), &["ghost"])];
        let resolver = DependencyResolver::new(UnknownDependencyPolicy::Fail);
        let err = resolver.resolve(&ops).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownDependency {
                id: "a".to_string(),
                missing: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_independent_operations_keep_submission_order() {
        let ops = vec![op(Some("x"), &[]), op(Some("y"), &[]), op(Some("z"), &[])];
        assert_eq!(resolve(&ops).unwrap(), vec![0, 1, 2]);
    }
}
