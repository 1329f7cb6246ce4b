//! Sequential plan execution against the target driver.
//!
//! The executor validates a plan, orders it through the dependency
//! resolver, expands composite/batch groups, and applies the resulting
//! trace one operation at a time. Every collaborator call is fully awaited
//! before the next operation starts: the driver represents one shared
//! mutable document and its synchronization barrier is not safe under
//! concurrent structural mutation. Mutual exclusion across distinct plan
//! runs is the host's responsibility.

use crate::approval::{ApprovalGate, ChangeState, PENDING_HIGHLIGHT_STYLE};
use crate::driver::{ActionRecorder, TargetDriver};
use crate::engine::resolver::{DependencyResolver, UnknownDependencyPolicy};
use crate::engine::trace::{ExecutionTrace, GroupKind, TraceNode};
use crate::error::EngineError;
use crate::plan::{warn_on_duplicates, Operation, Plan};
use crate::status::{PlanEvent, PlanStatus, StatusReporter};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked between operations only.
///
/// Cloning shares the underlying flag, so a host can hand one clone to the
/// executor and keep another to trigger cancellation.
#[derive(Debug, Clone)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation; takes effect before the next operation starts
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the flag for a new run
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for AbortFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for execution behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// How to treat `dependsOn` ids that match no operation
    pub unknown_dependency: UnknownDependencyPolicy,
}

/// Result of executing one plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Number of operations applied successfully
    pub completed_count: usize,
    /// Id of the first failed-but-ignored operation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_operation_id: Option<String>,
    /// Message of the first failed-but-ignored operation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Whether every operation applied cleanly
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Mutable accounting for one run
#[derive(Debug, Default)]
struct RunState {
    completed: usize,
    first_failure: Option<(Option<String>, String)>,
}

impl RunState {
    fn note_failure(&mut self, err: &EngineError) {
        if self.first_failure.is_none() {
            self.first_failure = Some((
                err.operation_id().map(|s| s.to_string()),
                err.to_string(),
            ));
        }
    }
}

/// Drives one plan at a time through the target driver
pub struct Executor {
    driver: Arc<dyn TargetDriver>,
    recorder: Option<Arc<dyn ActionRecorder>>,
    gate: ApprovalGate,
    reporter: Option<Arc<StatusReporter>>,
    abort: AbortFlag,
    config: EngineConfig,
}

impl Executor {
    /// Create an executor with approval gating disabled and no recorder
    pub fn new(driver: Arc<dyn TargetDriver>) -> Self {
        Self {
            driver,
            recorder: None,
            gate: ApprovalGate::disabled(),
            reporter: None,
            abort: AbortFlag::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn ActionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_gate(mut self, gate: ApprovalGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<StatusReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_abort_flag(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    /// Shared handle to this executor's abort flag
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Execute one plan to completion or first fatal failure.
    ///
    /// On success the result may still carry the first ignored failure.
    /// On a fatal failure `plan.error` is populated and the error
    /// propagates. A terminal `flush` is issued whenever execution started,
    /// even after an abort; pre-execution failures (validation, cycles)
    /// never touch the driver.
    pub async fn run(&self, plan: &mut Plan) -> Result<ExecutionResult, EngineError> {
        plan.reset_error();
        self.publish(plan, PlanStatus::Running, plan.description.clone());

        let trace = match self.prepare(plan) {
            Ok(trace) => trace,
            Err(e) => return Err(self.fail(plan, e)),
        };

        warn_on_duplicates(trace.leaves().into_iter());
        tracing::info!(
            plan = %plan.id.as_deref().unwrap_or("<unnamed>"),
            operations = trace.leaf_count(),
            "Executing plan"
        );

        let mut state = RunState::default();
        let mut outcome = Ok(());
        for node in trace.roots() {
            if self.abort.is_set() {
                outcome = Err(EngineError::Aborted);
                break;
            }
            if let Err(e) = self.run_node(node, &mut state).await {
                outcome = Err(e);
                break;
            }
        }

        // Terminal consistency barrier, issued even when the run aborted.
        if let Err(msg) = self.driver.flush().await {
            match &outcome {
                Ok(()) => {
                    outcome = Err(EngineError::Execution {
                        operation_id: None,
                        message: format!("final flush failed: {}", msg),
                    });
                }
                Err(_) => {
                    tracing::warn!(error = %msg, "Final flush failed after aborted run");
                }
            }
        }

        match outcome {
            Ok(()) => {
                let (failed_operation_id, error) = match state.first_failure {
                    Some((id, msg)) => (id, Some(msg)),
                    None => (None, None),
                };
                self.publish(
                    plan,
                    PlanStatus::Completed,
                    format!("Completed {} operations", state.completed),
                );
                Ok(ExecutionResult {
                    completed_count: state.completed,
                    failed_operation_id,
                    error,
                })
            }
            Err(e) => Err(self.fail(plan, e)),
        }
    }

    /// Validate, order, and expand a plan without touching the driver
    fn prepare(&self, plan: &Plan) -> Result<ExecutionTrace, EngineError> {
        plan.validate()?;
        let resolver = DependencyResolver::new(self.config.unknown_dependency);
        let order = resolver.resolve(&plan.operations)?;
        let ordered: Vec<Operation> = order
            .into_iter()
            .map(|i| plan.operations[i].clone())
            .collect();
        Ok(ExecutionTrace::build(ordered))
    }

    /// Run one trace node, applying the node's own `ignoreErrors` policy at
    /// its boundary. Callers only see failures that are not contained.
    fn run_node<'a>(
        &'a self,
        node: &'a TraceNode,
        state: &'a mut RunState,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let result = match node {
                TraceNode::Leaf(op) => self.apply_leaf(op, state).await,
                TraceNode::Group { kind, children, .. } => match kind {
                    GroupKind::Composite {
                        name,
                        abort_on_failure,
                    } => {
                        self.run_composite(name, *abort_on_failure, children, state)
                            .await
                    }
                    GroupKind::Batch { requires_sync } => {
                        self.run_batch(*requires_sync, children, state).await
                    }
                },
            };

            match result {
                Err(EngineError::Aborted) => Err(EngineError::Aborted),
                Err(e) if node.ignores_errors() => {
                    tracing::warn!(
                        operation = %node.operation_id().unwrap_or("<anonymous>"),
                        error = %e,
                        "Operation failed, continuing (ignoreErrors)"
                    );
                    state.note_failure(&e);
                    Ok(())
                }
                other => other,
            }
        })
    }

    /// Children run in listed order. A child failure either skips the
    /// remaining siblings and propagates (`abortOnFailure`) or is recorded
    /// while the siblings still run.
    async fn run_composite(
        &self,
        name: &str,
        abort_on_failure: bool,
        children: &[TraceNode],
        state: &mut RunState,
    ) -> Result<(), EngineError> {
        for child in children {
            if self.abort.is_set() {
                return Err(EngineError::Aborted);
            }
            if let Err(e) = self.run_node(child, state).await {
                if matches!(e, EngineError::Aborted) || abort_on_failure {
                    tracing::warn!(composite = name, error = %e, "Composite child failed, aborting group");
                    return Err(e);
                }
                tracing::warn!(composite = name, error = %e, "Composite child failed, siblings continue");
                state.note_failure(&e);
            }
        }
        Ok(())
    }

    /// Children run in listed order; any failure propagates immediately.
    /// With `requiresSync`, one barrier follows the whole batch.
    async fn run_batch(
        &self,
        requires_sync: bool,
        children: &[TraceNode],
        state: &mut RunState,
    ) -> Result<(), EngineError> {
        for child in children {
            if self.abort.is_set() {
                return Err(EngineError::Aborted);
            }
            self.run_node(child, state).await?;
        }
        if requires_sync {
            self.driver
                .flush()
                .await
                .map_err(|message| EngineError::Execution {
                    operation_id: None,
                    message: format!("batch sync failed: {}", message),
                })?;
        }
        Ok(())
    }

    /// Record intent, apply via the driver, then stage behind the approval
    /// gate when gating is active.
    async fn apply_leaf(&self, op: &Operation, state: &mut RunState) -> Result<(), EngineError> {
        if let Some(recorder) = &self.recorder {
            let target = op.kind.affected_regions().into_iter().next().unwrap_or_default();
            let workbook_id = self.gate.workbook_id().unwrap_or_default();
            // Best-effort: recording failures never block the operation.
            if let Err(e) = recorder.record_operation(&target, workbook_id, op).await {
                tracing::warn!(
                    operation = %op.describe(),
                    error = %e,
                    "Failed to record operation"
                );
            }
        }

        tracing::debug!(operation = %op.describe(), "Applying operation");
        self.driver
            .apply(op)
            .await
            .map_err(|message| EngineError::Execution {
                operation_id: op.id.clone(),
                message,
            })?;
        state.completed += 1;

        if self.gate.decision() == ChangeState::PendingApproval {
            match self.gate.track(op) {
                Ok(change) => {
                    tracing::debug!(
                        change = %change.id,
                        fingerprint = %change.fingerprint,
                        "Staged pending change"
                    );
                }
                Err(e) => {
                    tracing::warn!(operation = %op.describe(), error = %e, "Failed to stage pending change");
                }
            }
            let regions = op.kind.affected_regions();
            if !regions.is_empty() {
                if let Err(e) = self.driver.highlight(&regions, PENDING_HIGHLIGHT_STYLE).await {
                    tracing::warn!(error = %e, "Failed to highlight pending change");
                }
            }
        }

        Ok(())
    }

    /// Record the fatal error on the plan and publish the terminal event
    fn fail(&self, plan: &mut Plan, err: EngineError) -> EngineError {
        plan.record_error(err.to_string(), err.operation_id().map(|s| s.to_string()));
        self.publish(plan, PlanStatus::Failed, err.to_string());
        err
    }

    fn publish(&self, plan: &Plan, status: PlanStatus, message: String) {
        if let Some(reporter) = &self.reporter {
            reporter.publish(&PlanEvent::new(status, plan.id.clone(), message));
        }
    }
}
