//! Core trait for LLM backends.
//!
//! The engine and the prebuilt agents are provider-agnostic: they depend on
//! [`LlmClient`] and nothing else. Implementations handle message
//! conversion, transport, authentication and rate limiting for their
//! particular backend.
//!
//! Implementations must be `Send + Sync`; handles are shared across
//! concurrent invocations as `Arc<dyn LlmClient>`.

use crate::error::Result;
use crate::request::LlmRequest;
use crate::response::LlmResponse;
use async_trait::async_trait;

/// A text-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a complete response for the given request.
    ///
    /// Errors should be reserved for transport and protocol failures; a
    /// model producing unusable text is still an `Ok` response with an
    /// empty `json_answer`, and it is the caller's job to decide what that
    /// means.
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Short human-readable identifier for logs.
    fn name(&self) -> &str;
}
