//! Error types for plan execution.
//!
//! Fatal errors populate `Plan.error` and propagate to the caller.
//! Non-fatal conditions (unknown dependencies under the permissive policy,
//! recorder failures, ignored operation failures) are logged via `tracing`
//! and never surface here.

use thiserror::Error;

/// Errors raised by the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Plan or operation is malformed (duplicate id, empty id, bad JSON)
    #[error("invalid plan: {0}")]
    Validation(String),

    /// The dependency graph contains a cycle; named id is where the
    /// back-edge was detected
    #[error("cyclic dependency detected at operation '{id}'")]
    CyclicDependency { id: String },

    /// An operation depends on an id that does not exist in the plan.
    /// Only raised under `UnknownDependencyPolicy::Fail`.
    #[error("operation '{id}' depends on unknown operation '{missing}'")]
    UnknownDependency { id: String, missing: String },

    /// An operation failed while being applied to the target document
    #[error("operation {} failed: {message}", .operation_id.as_deref().unwrap_or("<anonymous>"))]
    Execution {
        operation_id: Option<String>,
        message: String,
    },

    /// The run was cancelled via the abort flag between operations
    #[error("plan execution aborted")]
    Aborted,
}

impl EngineError {
    /// The id of the operation this error is attributed to, if known
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            EngineError::CyclicDependency { id } => Some(id),
            EngineError::UnknownDependency { id, .. } => Some(id),
            EngineError::Execution { operation_id, .. } => operation_id.as_deref(),
            _ => None,
        }
    }
}
