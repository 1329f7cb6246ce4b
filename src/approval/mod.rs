//! Approval staging for plan operations.
//!
//! When gating is enabled and a workbook is bound, mutations are still
//! applied immediately (so their effects are visible) but each operation is
//! also registered as a [`PendingChange`] and its affected regions are
//! highlighted via the target driver. Approval and rejection happen
//! out-of-band through the [`ChangeTracker`]; a rejected change is *not*
//! rolled back; the engine applies eagerly and the driver exposes no
//! inverse operations.

use crate::plan::{fingerprint, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Highlight style requested for regions of staged changes
pub const PENDING_HIGHLIGHT_STYLE: &str = "pending_change";

/// Per-operation approval state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeState {
    /// Gating disabled or no workbook bound; executed with no staging
    #[default]
    Direct,
    /// Applied and awaiting an out-of-band decision
    PendingApproval,
    /// Accepted by an external actor
    Approved,
    /// Declined by an external actor. The applied mutation is not rolled
    /// back; hosts that need reversal must replay an inverse plan.
    Rejected,
}

/// An operation staged for human approval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Unique identifier for this staged change
    pub id: Uuid,
    /// Workbook the change was applied to
    pub workbook_id: String,
    /// Deterministic identity of the underlying operation
    pub fingerprint: String,
    /// The operation as executed
    pub operation: Operation,
    /// When the change was staged
    pub created_at: DateTime<Utc>,
    /// Current approval state
    pub state: ChangeState,
}

impl PendingChange {
    /// Stage a freshly applied operation
    pub fn new(workbook_id: impl Into<String>, operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            workbook_id: workbook_id.into(),
            fingerprint: fingerprint(&operation),
            operation,
            created_at: Utc::now(),
            state: ChangeState::PendingApproval,
        }
    }
}

/// Registry of staged changes.
///
/// `track_change` is called by the executor at staging time; resolution
/// (approve/reject) is driven by the host.
pub trait ChangeTracker: Send + Sync {
    fn track_change(&self, workbook_id: &str, op: &Operation) -> Result<PendingChange, String>;
}

/// In-memory change tracker.
///
/// Suitable for hosts that surface pending changes in their own UI and for
/// tests; persistent trackers implement [`ChangeTracker`] themselves.
#[derive(Debug, Default)]
pub struct MemoryChangeTracker {
    changes: Mutex<Vec<PendingChange>>,
}

impl MemoryChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all tracked changes
    pub fn changes(&self) -> Vec<PendingChange> {
        self.changes.lock().expect("change registry poisoned").clone()
    }

    /// Changes still awaiting a decision
    pub fn pending(&self) -> Vec<PendingChange> {
        self.changes()
            .into_iter()
            .filter(|c| c.state == ChangeState::PendingApproval)
            .collect()
    }

    /// Resolve a staged change. Returns false if the id is unknown or the
    /// change was already resolved.
    pub fn resolve(&self, id: Uuid, approved: bool) -> bool {
        let mut changes = self.changes.lock().expect("change registry poisoned");
        match changes
            .iter_mut()
            .find(|c| c.id == id && c.state == ChangeState::PendingApproval)
        {
            Some(change) => {
                change.state = if approved {
                    ChangeState::Approved
                } else {
                    ChangeState::Rejected
                };
                true
            }
            None => false,
        }
    }
}

impl ChangeTracker for MemoryChangeTracker {
    fn track_change(&self, workbook_id: &str, op: &Operation) -> Result<PendingChange, String> {
        let change = PendingChange::new(workbook_id, op.clone());
        self.changes
            .lock()
            .map_err(|_| "change registry poisoned".to_string())?
            .push(change.clone());
        Ok(change)
    }
}

/// Decides, per operation, whether execution is direct or staged
#[derive(Clone)]
pub struct ApprovalGate {
    tracker: Option<Arc<dyn ChangeTracker>>,
    workbook_id: Option<String>,
}

impl ApprovalGate {
    /// Gate with approval staging disabled; every operation runs direct
    pub fn disabled() -> Self {
        Self {
            tracker: None,
            workbook_id: None,
        }
    }

    /// Gate with staging enabled for the given workbook binding.
    /// With no workbook bound, operations still run direct.
    pub fn new(tracker: Arc<dyn ChangeTracker>, workbook_id: Option<String>) -> Self {
        Self {
            tracker: Some(tracker),
            workbook_id,
        }
    }

    /// Workbook the gate is bound to, if any
    pub fn workbook_id(&self) -> Option<&str> {
        self.workbook_id.as_deref()
    }

    /// Initial state for one operation instance
    pub fn decision(&self) -> ChangeState {
        match (&self.tracker, &self.workbook_id) {
            (Some(_), Some(_)) => ChangeState::PendingApproval,
            _ => ChangeState::Direct,
        }
    }

    /// Stage an already-applied operation as a pending change
    pub fn track(&self, op: &Operation) -> Result<PendingChange, String> {
        let tracker = self
            .tracker
            .as_ref()
            .ok_or_else(|| "approval gating is disabled".to_string())?;
        let workbook_id = self
            .workbook_id
            .as_deref()
            .ok_or_else(|| "no workbook bound".to_string())?;
        tracker.track_change(workbook_id, op)
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("enabled", &self.tracker.is_some())
            .field("workbook_id", &self.workbook_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OperationKind;
    use serde_json::json;

    fn set_value() -> Operation {
        Operation::new(OperationKind::SetValue {
            target: "Sheet1!A1".to_string(),
            value: json!(7),
        })
    }

    #[test]
    fn test_disabled_gate_runs_direct() {
        let gate = ApprovalGate::disabled();
        assert_eq!(gate.decision(), ChangeState::Direct);
        assert!(gate.track(&set_value()).is_err());
    }

    #[test]
    fn test_enabled_gate_without_workbook_runs_direct() {
        let tracker = Arc::new(MemoryChangeTracker::new());
        let gate = ApprovalGate::new(tracker, None);
        assert_eq!(gate.decision(), ChangeState::Direct);
    }

    #[test]
    fn test_enabled_gate_stages_pending_change() {
        let tracker = Arc::new(MemoryChangeTracker::new());
        let gate = ApprovalGate::new(Arc::clone(&tracker) as Arc<dyn ChangeTracker>, Some("wb-1".to_string()));
        assert_eq!(gate.decision(), ChangeState::PendingApproval);

        let change = gate.track(&set_value()).unwrap();
        assert_eq!(change.workbook_id, "wb-1");
        assert_eq!(change.state, ChangeState::PendingApproval);
        assert_eq!(change.fingerprint, fingerprint(&set_value()));
        assert_eq!(tracker.pending().len(), 1);
    }

    #[test]
    fn test_resolve_is_terminal() {
        let tracker = MemoryChangeTracker::new();
        let change = tracker.track_change("wb-1", &set_value()).unwrap();

        assert!(tracker.resolve(change.id, false));
        assert_eq!(tracker.changes()[0].state, ChangeState::Rejected);

        // Already resolved; a second decision is refused.
        assert!(!tracker.resolve(change.id, true));
        assert_eq!(tracker.changes()[0].state, ChangeState::Rejected);
    }

    #[test]
    fn test_resolve_unknown_id_is_refused() {
        let tracker = MemoryChangeTracker::new();
        assert!(!tracker.resolve(Uuid::new_v4(), true));
    }
}
