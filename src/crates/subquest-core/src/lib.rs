//! Core orchestration engine for subquest.
//!
//! subquest answers complex natural-language questions by decomposing them
//! into a DAG of atomic sub-questions, driving each sub-question through a
//! per-step reasoning loop that selects tools, invokes them, validates
//! results and optionally retries, and finally synthesizing a user-facing
//! answer from the per-step outputs.
//!
//! This crate is the engine itself. It knows nothing about SQL, vector
//! stores or any particular LLM; those live behind the [`agent::Agent`]
//! trait and are registered into an [`registry::AgentRegistry`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Engine::invoke                         │
//! │                                                              │
//! │  planner ──► scheduler ──────────────► synthesizer ──► end   │
//! │                 │  ▲                                         │
//! │      step ready │  │ always                                  │
//! │                 ▼  │                                         │
//! │              reasoner ──► executor                           │
//! │                 │              │                             │
//! │                 └──────────────┘ (via scheduler)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every node reads the [`context::ExecutionContext`], mutates it and hands
//! it back; the driver in [`graph`] owns routing. Errors never cross node
//! boundaries as `Err` values: agents return [`result::AgentResult`]
//! envelopes, nodes convert internal failures into failed steps, and
//! `invoke` always returns a context.
//!
//! # Components
//!
//! - [`result`] - the uniform envelope every agent operation returns
//! - [`registry`] - agent catalog, dispatch and the sanitized tool snapshot
//! - [`context`] - the single mutable state object threaded through nodes
//! - [`plan`] - the immutable sub-question DAG
//! - [`nodes`] - planner, scheduler, reasoner, executor, synthesizer
//! - [`graph`] - the driver that wires the nodes together

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod names;
pub mod nodes;
pub mod plan;
pub mod registry;
pub mod result;

pub use agent::{Agent, OperationKind};
pub use config::EngineConfig;
pub use context::step::{
    Hypothesis, ReasonerDecision, Stage, StepExecutionState, ValidationResult,
};
pub use context::{ExecutionContext, ToolCall};
pub use error::{EngineError, Result};
pub use graph::{CancelToken, Engine};
pub use plan::{Plan, SubQuestion};
pub use registry::{
    AgentDescriptor, AgentRegistry, Namespace, OperationSpec, ParamSpec,
};
pub use result::{AgentResult, ResultStatus};
