//! Deterministic operation identity strings.
//!
//! A fingerprint is derived from an operation's type tag plus the payload
//! fields that discriminate it (e.g. `target`+`value` for a value write,
//! `range`+`style` for formatting, sheet `name` for lifecycle operations).
//! Identical logical intents always produce identical fingerprints; the
//! string is used for duplicate-intent warnings and as the identity of a
//! pending change, never for correctness-critical merging.

use crate::plan::operation::{Operation, OperationKind};
use std::collections::HashSet;

/// Compute the fingerprint for a single operation.
///
/// The result is `type:field|field|...` over the discriminating fields of
/// that type, in a fixed order, so it is stable across repeated calls and
/// across reorderings of unrelated metadata.
pub fn fingerprint(op: &Operation) -> String {
    let tag = op.kind.type_tag();
    let fields = discriminating_fields(&op.kind);
    format!("{}:{}", tag, fields.join("|"))
}

/// The discriminating payload fields for each operation type, in fixed order
fn discriminating_fields(kind: &OperationKind) -> Vec<String> {
    match kind {
        OperationKind::SetValue { target, value } => {
            vec![target.clone(), value.to_string()]
        }
        OperationKind::SetFormula { target, formula } => {
            vec![target.clone(), formula.clone()]
        }
        OperationKind::CopyRange {
            source,
            destination,
        }
        | OperationKind::MoveRange {
            source,
            destination,
        } => vec![source.clone(), destination.clone()],
        OperationKind::FormatRange { range, style } => vec![range.clone(), style.clone()],
        OperationKind::ClearRange { range } | OperationKind::MergeCells { range } => {
            vec![range.clone()]
        }
        OperationKind::CreateSheet { name } | OperationKind::DeleteSheet { name } => {
            vec![name.clone()]
        }
        OperationKind::RenameSheet { name, new_name } => {
            vec![name.clone(), new_name.clone()]
        }
        OperationKind::Composite {
            name, operations, ..
        } => vec![name.clone(), operations.len().to_string()],
        OperationKind::Batch { operations, .. } => vec![operations.len().to_string()],
    }
}

/// Warn about operations within one expanded trace that share a fingerprint.
///
/// Duplicate intents are usually a plan-generator slip (the same write
/// emitted twice). They are never rejected; the later occurrence still runs.
pub fn warn_on_duplicates<'a, I>(ops: I)
where
    I: IntoIterator<Item = &'a Operation>,
{
    let mut seen = HashSet::new();
    for op in ops {
        let fp = fingerprint(op);
        if !seen.insert(fp.clone()) {
            tracing::warn!(
                fingerprint = %fp,
                operation = %op.describe(),
                "Duplicate operation intent in plan"
            );
        }
    }
}
