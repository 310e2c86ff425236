//! The agent implementation contract.
//!
//! Agents are chosen by name at runtime; the engine only ever sees the
//! [`Agent`] trait. Each agent exposes a set of named operations, described
//! statically by [`crate::registry::OperationSpec`] so the planner and
//! reasoner can see the catalog without instantiating anything.
//!
//! Conventions every implementation must follow:
//!
//! - lazy initialization (DB connections, LLM handles) happens on first
//!   `execute_operation` and must be idempotent;
//! - operations are stateless with respect to the agent instance, so one
//!   cached instance can serve concurrent invocations;
//! - failures are returned as [`AgentResult::error`], never panics and
//!   never `Err` values; the envelope is the error channel;
//! - `agent`/`operation`/elapsed-time stamping belongs to the dispatcher,
//!   not the operation.

use crate::context::ExecutionContext;
use crate::result::AgentResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of an operation, carried into the tool snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Parametric data access.
    Direct,
    /// Entity or result validation.
    Validation,
    /// LLM-backed semantic processing.
    Semantic,
    /// Engine-internal control decisions. Never offered as a tool.
    Control,
}

/// A named agent exposing typed operations.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The agent's registry name.
    fn name(&self) -> &str;

    /// Execute one operation.
    ///
    /// `context` is a read-only view; all writes to shared state go
    /// through the nodes that own the context.
    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        context: &ExecutionContext,
    ) -> AgentResult;
}
