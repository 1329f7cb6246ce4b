//! Plan types and validation.
//!
//! A [`Plan`] is an ordered collection of typed operations submitted for one
//! execution run. Plans arrive as JSON from the plan generator; validation
//! here is structural only (ids unique and non-empty); semantic checks
//! against the workbook belong to the target driver.

pub mod fingerprint;
pub mod operation;

pub use fingerprint::{fingerprint, warn_on_duplicates};
pub use operation::{Operation, OperationKind};

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Error recorded on a plan after a fatal failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanError {
    /// What went wrong
    pub message: String,
    /// Id of the operation that failed, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

/// An ordered set of operations submitted for one execution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Optional plan identifier from the generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable summary of what this plan does
    pub description: String,

    /// Operations in submission order
    pub operations: Vec<Operation>,

    /// First fatal error of the current execution attempt, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlanError>,
}

impl Plan {
    /// Create an empty plan
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: None,
            description: description.into(),
            operations: Vec::new(),
            error: None,
        }
    }

    /// Parse a plan from the generator's JSON output
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Validation(e.to_string()))
    }

    /// Add an operation in submission order
    pub fn push(&mut self, op: Operation) {
        self.operations.push(op);
    }

    /// Record a fatal error. Written at most once per execution attempt;
    /// later calls are ignored so the first failure is what the caller sees.
    pub fn record_error(&mut self, message: impl Into<String>, operation_id: Option<String>) {
        if self.error.is_none() {
            self.error = Some(PlanError {
                message: message.into(),
                operation_id,
            });
        }
    }

    /// Clear any error from a previous attempt
    pub fn reset_error(&mut self) {
        self.error = None;
    }

    /// Structural validation: every declared id is non-empty and unique
    /// within the plan, recursively through group operations.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        validate_ops(&self.operations, &mut seen)
    }

    /// Compute a hash of the plan for validation.
    /// This is used to ensure the plan hasn't been modified between staging
    /// and execution.
    pub fn compute_hash(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        hash_ops(&self.operations, &mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

fn validate_ops(ops: &[Operation], seen: &mut HashSet<String>) -> Result<(), EngineError> {
    for op in ops {
        if let Some(id) = &op.id {
            if id.is_empty() {
                return Err(EngineError::Validation(format!(
                    "operation '{}' has an empty id",
                    op.describe()
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(EngineError::Validation(format!(
                    "duplicate operation id '{}'",
                    id
                )));
            }
        }
        match &op.kind {
            OperationKind::Composite { operations, .. }
            | OperationKind::Batch { operations, .. } => {
                validate_ops(operations, seen)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn hash_ops(ops: &[Operation], hasher: &mut std::collections::hash_map::DefaultHasher) {
    use std::hash::Hash;

    for op in ops {
        op.id.hash(hasher);
        op.depends_on.hash(hasher);
        op.ignore_errors.hash(hasher);
        fingerprint::fingerprint(op).hash(hasher);
        match &op.kind {
            OperationKind::Composite { operations, .. }
            | OperationKind::Batch { operations, .. } => {
                hash_ops(operations, hasher);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set_value(target: &str, value: serde_json::Value) -> Operation {
        Operation::new(OperationKind::SetValue {
            target: target.to_string(),
            value,
        })
    }

    #[test]
    fn test_from_json() {
        let plan = Plan::from_json(
            r#"{
                "id": "plan-1",
                "description": "Summarize Q3",
                "operations": [
                    {"id": "a", "type": "create_sheet", "name": "Summary"},
                    {"id": "b", "type": "copy_range", "source": "Sheet1!A1:D10",
                     "destination": "Summary!A1", "dependsOn": ["a"]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.operations.len(), 2);
        assert_eq!(plan.operations[1].depends_on, vec!["a".to_string()]);
    }

    #[test]
    fn test_from_json_rejects_missing_type() {
        let result = Plan::from_json(
            r#"{"description": "bad", "operations": [{"id": "a", "name": "Summary"}]}"#,
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut plan = Plan::new("dup");
        plan.push(Operation::with_id("a", OperationKind::CreateSheet {
            name: "One".to_string(),
        }));
        plan.push(Operation::with_id("a", OperationKind::CreateSheet {
            name: "Two".to_string(),
        }));
        assert!(matches!(plan.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_id_inside_group() {
        let mut plan = Plan::new("nested dup");
        plan.push(Operation::with_id("a", OperationKind::CreateSheet {
            name: "One".to_string(),
        }));
        plan.push(Operation::new(OperationKind::Composite {
            name: "group".to_string(),
            operations: vec![Operation::with_id("a", OperationKind::ClearRange {
                range: "One!A1".to_string(),
            })],
            abort_on_failure: false,
        }));
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let mut plan = Plan::new("empty id");
        plan.push(Operation::with_id("", OperationKind::ClearRange {
            range: "A1".to_string(),
        }));
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_record_error_writes_once() {
        let mut plan = Plan::new("errors");
        plan.record_error("first failure", Some("a".to_string()));
        plan.record_error("second failure", Some("b".to_string()));
        let err = plan.error.unwrap();
        assert_eq!(err.message, "first failure");
        assert_eq!(err.operation_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_compute_hash_stable_and_sensitive() {
        let mut plan = Plan::new("hash");
        plan.push(set_value("Sheet1!A1", json!(1)));
        let h1 = plan.compute_hash();
        assert_eq!(h1, plan.compute_hash());
        assert_eq!(h1.len(), 16);

        plan.operations[0] = set_value("Sheet1!A1", json!(2));
        assert_ne!(h1, plan.compute_hash());
    }
}
