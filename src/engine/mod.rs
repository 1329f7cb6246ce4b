//! Execution Engine Module
//!
//! Orders plan operations by their declared dependencies, expands
//! composite/batch groups into an execution trace, and drives the trace
//! sequentially through the target driver with per-operation failure
//! containment.

pub mod executor;
pub mod resolver;
pub mod trace;

pub use executor::{AbortFlag, EngineConfig, ExecutionResult, Executor};
pub use resolver::{DependencyResolver, UnknownDependencyPolicy};
pub use trace::{ExecutionTrace, GroupKind, TraceNode};
