//! Expansion of composite/batch groups into an execution trace.
//!
//! After top-level ordering, each operation is expanded in place: scalar
//! operations become leaves, group operations become group nodes holding
//! their recursively expanded children. Children keep their listed order;
//! dependency resolution applies only at the plan's top level. The trace is
//! what the executor walks, and what the fingerprint duplicate scan runs
//! over.

use crate::plan::{Operation, OperationKind};

/// Failure-containment flavor of a group node
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKind {
    /// Named group; `abort_on_failure` controls whether a child failure
    /// skips remaining siblings and propagates
    Composite {
        name: String,
        abort_on_failure: bool,
    },
    /// Group whose child failures always propagate; `requires_sync` issues
    /// one barrier after the whole batch completes
    Batch { requires_sync: bool },
}

/// One node of the expanded execution trace
#[derive(Debug, Clone, PartialEq)]
pub enum TraceNode {
    /// A scalar operation, applied directly via the target driver
    Leaf(Operation),
    /// An expanded group operation
    Group {
        kind: GroupKind,
        /// Id of the original group operation, for error attribution
        id: Option<String>,
        /// The group operation's own failure policy in its parent sequence
        ignore_errors: bool,
        children: Vec<TraceNode>,
    },
}

impl TraceNode {
    /// Whether a failure of this node is contained by its own policy
    pub fn ignores_errors(&self) -> bool {
        match self {
            TraceNode::Leaf(op) => op.ignore_errors,
            TraceNode::Group { ignore_errors, .. } => *ignore_errors,
        }
    }

    /// Id of the underlying operation, for error attribution
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            TraceNode::Leaf(op) => op.id.as_deref(),
            TraceNode::Group { id, .. } => id.as_deref(),
        }
    }
}

/// The fully expanded form of one ordered plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionTrace {
    roots: Vec<TraceNode>,
}

impl ExecutionTrace {
    /// Expand `ops` (already in execution order) into a trace.
    pub fn build(ops: Vec<Operation>) -> Self {
        Self {
            roots: ops.into_iter().map(expand).collect(),
        }
    }

    pub fn roots(&self) -> &[TraceNode] {
        &self.roots
    }

    /// All scalar operations in execution order
    pub fn leaves(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        collect_leaves(&self.roots, &mut out);
        out
    }

    /// Number of scalar operations in the trace
    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }
}

/// Substitute a group operation with its expanded children, recursively
fn expand(op: Operation) -> TraceNode {
    let Operation {
        id,
        ignore_errors,
        kind,
        depends_on,
        description,
    } = op;

    match kind {
        OperationKind::Composite {
            name,
            operations,
            abort_on_failure,
        } => TraceNode::Group {
            kind: GroupKind::Composite {
                name,
                abort_on_failure,
            },
            id,
            ignore_errors,
            children: operations.into_iter().map(expand).collect(),
        },
        OperationKind::Batch {
            operations,
            requires_sync,
        } => TraceNode::Group {
            kind: GroupKind::Batch { requires_sync },
            id,
            ignore_errors,
            children: operations.into_iter().map(expand).collect(),
        },
        kind => TraceNode::Leaf(Operation {
            id,
            depends_on,
            ignore_errors,
            description,
            kind,
        }),
    }
}

fn collect_leaves<'a>(nodes: &'a [TraceNode], out: &mut Vec<&'a Operation>) {
    for node in nodes {
        match node {
            TraceNode::Leaf(op) => out.push(op),
            TraceNode::Group { children, .. } => collect_leaves(children, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set_value(target: &str) -> Operation {
        Operation::new(OperationKind::SetValue {
            target: target.to_string(),
            value: json!(1),
        })
    }

    fn composite(name: &str, abort: bool, ops: Vec<Operation>) -> Operation {
        Operation::new(OperationKind::Composite {
            name: name.to_string(),
            operations: ops,
            abort_on_failure: abort,
        })
    }

    #[test]
    fn test_scalar_ops_become_leaves_in_order() {
        let trace = ExecutionTrace::build(vec![set_value("A1"), set_value("A2")]);
        let leaves = trace.leaves();
        assert_eq!(leaves.len(), 2);
        assert!(matches!(
            &leaves[0].kind,
            OperationKind::SetValue { target, .. } if target == "A1"
        ));
    }

    #[test]
    fn test_nested_groups_expand_recursively() {
        let inner = Operation::new(OperationKind::Batch {
            operations: vec![set_value("B1"), set_value("B2")],
            requires_sync: true,
        });
        let outer = composite("outer", true, vec![set_value("A1"), inner]);
        let trace = ExecutionTrace::build(vec![outer, set_value("C1")]);

        assert_eq!(trace.leaf_count(), 4);
        let roots = trace.roots();
        assert_eq!(roots.len(), 2);
        let TraceNode::Group { kind, children, .. } = &roots[0] else {
            panic!("expected group root");
        };
        assert_eq!(
            *kind,
            GroupKind::Composite {
                name: "outer".to_string(),
                abort_on_failure: true,
            }
        );
        assert!(matches!(
            &children[1],
            TraceNode::Group {
                kind: GroupKind::Batch { requires_sync: true },
                ..
            }
        ));
    }

    #[test]
    fn test_group_metadata_survives_expansion() {
        let mut group = composite("g", false, vec![set_value("A1")]);
        group.id = Some("g1".to_string());
        group.ignore_errors = true;
        let trace = ExecutionTrace::build(vec![group]);
        let TraceNode::Group {
            id, ignore_errors, ..
        } = &trace.roots()[0]
        else {
            panic!("expected group");
        };
        assert_eq!(id.as_deref(), Some("g1"));
        assert!(*ignore_errors);
    }

    #[test]
    fn test_leaves_preserve_child_listed_order() {
        let group = composite(
            "g",
            false,
            vec![set_value("A3"), set_value("A1"), set_value("A2")],
        );
        let trace = ExecutionTrace::build(vec![group]);
        let targets: Vec<_> = trace
            .leaves()
            .iter()
            .map(|op| match &op.kind {
                OperationKind::SetValue { target, .. } => target.clone(),
                _ => unreachable!(),
            })
            .collect();
        // Children are never re-sorted by dependency.
        assert_eq!(targets, vec!["A3", "A1", "A2"]);
    }
}
