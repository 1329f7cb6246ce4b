//! Plan lifecycle status reporting.
//!
//! The engine publishes one `Running` event when a run starts and exactly
//! one terminal `Completed` or `Failed` event when it ends. Hosts subscribe
//! listeners and redirect events to logs, UI, or telemetry; the engine
//! itself never renders progress.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle status of a plan run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Run has started
    Running,
    /// Run finished with no fatal error
    Completed,
    /// Run ended on a fatal error or abort
    Failed,
}

/// A single lifecycle event published to listeners
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanEvent {
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub message: String,
}

impl PlanEvent {
    pub fn new(status: PlanStatus, plan_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            plan_id,
            message: message.into(),
        }
    }
}

/// Handle returned by [`StatusReporter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&PlanEvent) + Send + Sync>;

/// Listener registry for plan lifecycle events.
///
/// Listeners are notified synchronously, in registration order.
/// Unsubscribing is idempotent. Listeners may subscribe, unsubscribe, or
/// publish on the same reporter from inside a callback; the registry lock
/// is never held while a listener runs.
#[derive(Default)]
pub struct StatusReporter {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns a handle for unsubscribing
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&PlanEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("status listener registry poisoned")
            .push((id, Arc::new(listener)));
        SubscriptionId(id)
    }

    /// Remove a listener. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .expect("status listener registry poisoned")
            .retain(|(lid, _)| *lid != id.0);
    }

    /// Publish an event to all listeners in registration order.
    ///
    /// The registration snapshot is taken up front and the lock released
    /// before any listener runs, so a callback that touches the reporter
    /// does not deadlock. Listeners registered mid-publish see the next
    /// event; listeners removed mid-publish may still see this one.
    pub fn publish(&self, event: &PlanEvent) {
        let snapshot: Vec<Listener> = {
            let listeners = self
                .listeners
                .lock()
                .expect("status listener registry poisoned");
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            listener(event);
        }
    }
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("StatusReporter")
            .field("listeners", &count)
            .finish()
    }
}
