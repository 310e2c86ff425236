//! Error types for engine construction and configuration.
//!
//! Note the narrow scope: once [`crate::Engine::invoke`] is running, errors
//! are values ([`crate::AgentResult`] envelopes) and never cross node
//! boundaries as `Err`. `EngineError` exists for the setup path only:
//! registering agents, validating plans, resolving constructors.

use thiserror::Error;

/// Convenience result type using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while assembling or configuring the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A registry lookup failed.
    #[error("agent '{agent}' not found in {namespace} registry")]
    UnknownAgent { agent: String, namespace: String },

    /// An operation lookup failed.
    #[error("operation '{operation}' not found on agent '{agent}'")]
    UnknownOperation { agent: String, operation: String },

    /// An agent constructor failed.
    #[error("failed to construct agent '{agent}': {message}")]
    Construction { agent: String, message: String },

    /// A plan violated its structural invariants.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Serialization failure while moving state in or out of the context.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
