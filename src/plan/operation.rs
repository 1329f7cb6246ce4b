//! Operation types for workbook edit plans.
//!
//! Every edit intent is a typed variant of [`OperationKind`]; the enclosing
//! [`Operation`] carries plan-level metadata (`id`, `depends_on`,
//! `ignore_errors`). Two variants are structural: `composite` and `batch`
//! embed nested operation sequences with their own failure-containment rules.

use serde::{Deserialize, Serialize};

/// The typed payload of an operation.
///
/// The `type` tag matches the wire vocabulary emitted by the plan generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Write a literal value into a cell or range
    SetValue {
        target: String,
        value: serde_json::Value,
    },
    /// Write a formula into a cell
    SetFormula { target: String, formula: String },
    /// Copy a range to another location
    CopyRange {
        source: String,
        destination: String,
    },
    /// Move a range to another location
    MoveRange {
        source: String,
        destination: String,
    },
    /// Apply a named style to a range
    FormatRange { range: String, style: String },
    /// Clear values and formatting from a range
    ClearRange { range: String },
    /// Merge all cells in a range into one
    MergeCells { range: String },
    /// Create a new sheet
    CreateSheet { name: String },
    /// Delete an existing sheet
    DeleteSheet { name: String },
    /// Rename an existing sheet
    RenameSheet {
        name: String,
        #[serde(rename = "newName")]
        new_name: String,
    },
    /// Named group of child operations with its own abort policy
    Composite {
        name: String,
        operations: Vec<Operation>,
        #[serde(rename = "abortOnFailure", default)]
        abort_on_failure: bool,
    },
    /// Ordered group of child operations, optionally followed by one
    /// synchronization barrier
    Batch {
        operations: Vec<Operation>,
        #[serde(rename = "requiresSync", default)]
        requires_sync: bool,
    },
}

impl OperationKind {
    /// The wire tag for this operation type
    pub fn type_tag(&self) -> &'static str {
        match self {
            OperationKind::SetValue { .. } => "set_value",
            OperationKind::SetFormula { .. } => "set_formula",
            OperationKind::CopyRange { .. } => "copy_range",
            OperationKind::MoveRange { .. } => "move_range",
            OperationKind::FormatRange { .. } => "format_range",
            OperationKind::ClearRange { .. } => "clear_range",
            OperationKind::MergeCells { .. } => "merge_cells",
            OperationKind::CreateSheet { .. } => "create_sheet",
            OperationKind::DeleteSheet { .. } => "delete_sheet",
            OperationKind::RenameSheet { .. } => "rename_sheet",
            OperationKind::Composite { .. } => "composite",
            OperationKind::Batch { .. } => "batch",
        }
    }

    /// Whether this operation embeds child operations
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            OperationKind::Composite { .. } | OperationKind::Batch { .. }
        )
    }

    /// Workbook regions this operation touches, as range references.
    ///
    /// Used by the approval gate to request visual highlighting of staged
    /// changes. Group variants return nothing; their children are staged
    /// individually after expansion.
    pub fn affected_regions(&self) -> Vec<String> {
        match self {
            OperationKind::SetValue { target, .. } | OperationKind::SetFormula { target, .. } => {
                vec![target.clone()]
            }
            OperationKind::CopyRange {
                source,
                destination,
            }
            | OperationKind::MoveRange {
                source,
                destination,
            } => vec![source.clone(), destination.clone()],
            OperationKind::FormatRange { range, .. }
            | OperationKind::ClearRange { range }
            | OperationKind::MergeCells { range } => vec![range.clone()],
            OperationKind::CreateSheet { name } | OperationKind::DeleteSheet { name } => {
                vec![name.clone()]
            }
            OperationKind::RenameSheet { name, .. } => vec![name.clone()],
            OperationKind::Composite { .. } | OperationKind::Batch { .. } => Vec::new(),
        }
    }

    /// Get a human-readable description of this operation
    pub fn description(&self) -> String {
        match self {
            OperationKind::SetValue { target, value } => {
                format!("Set {} = {}", target, value)
            }
            OperationKind::SetFormula { target, formula } => {
                format!("Set formula {} = {}", target, formula)
            }
            OperationKind::CopyRange {
                source,
                destination,
            } => {
                format!("Copy {} -> {}", source, destination)
            }
            OperationKind::MoveRange {
                source,
                destination,
            } => {
                format!("Move {} -> {}", source, destination)
            }
            OperationKind::FormatRange { range, style } => {
                format!("Format {} as {}", range, style)
            }
            OperationKind::ClearRange { range } => format!("Clear {}", range),
            OperationKind::MergeCells { range } => format!("Merge {}", range),
            OperationKind::CreateSheet { name } => format!("Create sheet: {}", name),
            OperationKind::DeleteSheet { name } => format!("Delete sheet: {}", name),
            OperationKind::RenameSheet { name, new_name } => {
                format!("Rename sheet {} to {}", name, new_name)
            }
            OperationKind::Composite {
                name, operations, ..
            } => {
                format!("Composite '{}' ({} operations)", name, operations.len())
            }
            OperationKind::Batch { operations, .. } => {
                format!("Batch ({} operations)", operations.len())
            }
        }
    }
}

/// A single edit intent with plan-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique identifier within the plan; id-free operations cannot be
    /// depended upon and always run before id-bearing ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ids of operations that must complete before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// When true, a failure of this operation is logged and the run continues
    #[serde(default)]
    pub ignore_errors: bool,

    /// Optional human-readable note from the plan generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The typed payload
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    /// Create an operation with no metadata
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: None,
            depends_on: Vec::new(),
            ignore_errors: false,
            description: None,
            kind,
        }
    }

    /// Create an operation with an id
    pub fn with_id(id: impl Into<String>, kind: OperationKind) -> Self {
        let mut op = Self::new(kind);
        op.id = Some(id.into());
        op
    }

    /// Attach dependency ids
    pub fn depends_on(mut self, ids: Vec<String>) -> Self {
        self.depends_on = ids;
        self
    }

    /// Mark failures of this operation as non-fatal
    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    /// Human-readable description, preferring the generator's note
    pub fn describe(&self) -> String {
        match &self.description {
            Some(d) => d.clone(),
            None => self.kind.description(),
        }
    }

    /// Id for logging and error attribution
    pub fn id_for_display(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_tagged_operation() {
        let op: Operation = serde_json::from_str(
            r#"{"id":"a","type":"create_sheet","name":"Summary"}"#,
        )
        .unwrap();
        assert_eq!(op.id.as_deref(), Some("a"));
        assert!(matches!(op.kind, OperationKind::CreateSheet { ref name } if name == "Summary"));
        assert!(!op.ignore_errors);
        assert!(op.depends_on.is_empty());
    }

    #[test]
    fn test_deserialize_with_dependencies() {
        let op: Operation = serde_json::from_str(
            r#"{"id":"b","type":"copy_range","source":"Sheet1!A1:D10",
                "destination":"Summary!A1","dependsOn":["a"],"ignoreErrors":true}"#,
        )
        .unwrap();
        assert_eq!(op.depends_on, vec!["a".to_string()]);
        assert!(op.ignore_errors);
    }

    #[test]
    fn test_deserialize_nested_composite() {
        let op: Operation = serde_json::from_str(
            r#"{"type":"composite","name":"setup","abortOnFailure":true,
                "operations":[
                  {"type":"create_sheet","name":"Data"},
                  {"type":"batch","requiresSync":true,"operations":[
                    {"type":"set_value","target":"Data!A1","value":42}
                  ]}
                ]}"#,
        )
        .unwrap();
        let OperationKind::Composite {
            operations,
            abort_on_failure,
            ..
        } = &op.kind
        else {
            panic!("expected composite");
        };
        assert!(*abort_on_failure);
        assert_eq!(operations.len(), 2);
        assert!(operations[1].kind.is_group());
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let result: Result<Operation, _> =
            serde_json::from_str(r#"{"id":"a","name":"Summary"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_affected_regions_by_kind() {
        let set = OperationKind::SetValue {
            target: "Sheet1!B2".to_string(),
            value: json!("x"),
        };
        assert_eq!(set.affected_regions(), vec!["Sheet1!B2".to_string()]);

        let copy = OperationKind::CopyRange {
            source: "Sheet1!A1:D10".to_string(),
            destination: "Summary!A1".to_string(),
        };
        assert_eq!(
            copy.affected_regions(),
            vec!["Sheet1!A1:D10".to_string(), "Summary!A1".to_string()]
        );

        let group = OperationKind::Batch {
            operations: vec![Operation::new(set)],
            requires_sync: false,
        };
        assert!(group.affected_regions().is_empty());
    }

    #[test]
    fn test_type_tag_round_trip() {
        let op = Operation::new(OperationKind::FormatRange {
            range: "Summary!A1:D10".to_string(),
            style: "Currency".to_string(),
        });
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["type"], "format_range");
        assert_eq!(op.kind.type_tag(), "format_range");
    }
}
