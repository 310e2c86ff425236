//! Error types for LLM client operations.

use thiserror::Error;

/// Convenience result type using [`LlmError`].
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors surfaced by LLM clients and the profile registry.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The named profile was never registered.
    #[error("unknown llm profile '{0}'")]
    UnknownProfile(String),

    /// The profile references an API key environment variable that is unset.
    #[error("api key environment variable '{0}' is not set")]
    MissingApiKey(String),

    /// Transport-level failure talking to the backend.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// The backend answered 2xx but the payload was not usable.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// All retry attempts were consumed without a successful call.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// A scripted client ran out of canned responses.
    #[error("scripted client has no responses left")]
    ScriptExhausted,
}
