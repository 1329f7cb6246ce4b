//! Collaborator traits for applying operations to the real document.
//!
//! The engine never touches a workbook directly. The host wires in a
//! [`TargetDriver`] that maps each operation onto the concrete document API,
//! and optionally an [`ActionRecorder`] that captures pre-execution intent
//! for change history. Both are injected explicitly; there is no global
//! driver instance.

use crate::plan::Operation;
use async_trait::async_trait;

/// Applies operations to the shared mutable document.
///
/// `apply` rejects on failure; `flush` is the consistency barrier issued
/// once at the end of every run (and after a `batch` with `requiresSync`);
/// `highlight` visually marks regions of staged pending changes. The driver
/// owns any timeout policy; the engine enforces none.
#[async_trait]
pub trait TargetDriver: Send + Sync {
    async fn apply(&self, op: &Operation) -> Result<(), String>;
    async fn flush(&self) -> Result<(), String>;
    async fn highlight(&self, regions: &[String], style: &str) -> Result<(), String>;
}

/// Best-effort recorder of operations about to execute.
///
/// Recording failures are logged by the engine and never block or fail the
/// operation being recorded.
#[async_trait]
pub trait ActionRecorder: Send + Sync {
    async fn record_operation(
        &self,
        target: &str,
        workbook_id: &str,
        op: &Operation,
    ) -> Result<(), String>;
}
