//! sheetflow: dependency-ordered execution of declarative workbook edit
//! plans.
//!
//! A [`Plan`](plan::Plan) is an ordered collection of typed edit operations,
//! some carrying inter-operation dependencies. The engine orders them
//! consistently with every `dependsOn` edge (rejecting cycles before any
//! mutation), expands nested composite/batch groups with their own
//! failure-containment rules, and applies the result sequentially through a
//! host-supplied [`TargetDriver`](driver::TargetDriver). Operations can be
//! staged behind a human-approval workflow and every run publishes
//! lifecycle events to subscribed listeners.
//!
//! Generation of plans, the concrete workbook API, and persistence of
//! change history are all external collaborators injected by the host; the
//! crate holds no global state.

pub mod approval;
pub mod driver;
pub mod engine;
pub mod error;
pub mod plan;
pub mod status;

pub use approval::{ApprovalGate, ChangeState, ChangeTracker, MemoryChangeTracker, PendingChange};
pub use driver::{ActionRecorder, TargetDriver};
pub use engine::{
    AbortFlag, DependencyResolver, EngineConfig, ExecutionResult, ExecutionTrace, Executor,
    UnknownDependencyPolicy,
};
pub use error::EngineError;
pub use plan::{fingerprint, Operation, OperationKind, Plan, PlanError};
pub use status::{PlanEvent, PlanStatus, StatusReporter, SubscriptionId};
