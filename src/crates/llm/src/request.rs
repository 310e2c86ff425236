//! Standardized request model for LLM calls.
//!
//! [`LlmRequest`] is the single contract for handing a prompt to a backend.
//! Multi-turn exchanges are expressed as a list of [`LlmMessage`]s.

use serde::{Deserialize, Serialize};

/// Role of a message author in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire-format name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a dialog with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

impl LlmMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Structured request to an LLM backend.
///
/// Defaults match the conservative settings used by the control agents:
/// low temperature, nucleus sampling at 0.9, and a 1024-token budget.
/// Customize with the builder methods.
///
/// ```rust
/// use llm::{LlmMessage, LlmRequest};
///
/// let request = LlmRequest::new(vec![LlmMessage::user("hello")])
///     .with_temperature(0.0)
///     .with_max_tokens(2048);
/// assert_eq!(request.temperature, 0.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Dialog history, oldest first.
    pub messages: Vec<LlmMessage>,

    /// Sampling temperature in `[0.0, 1.0]`.
    pub temperature: f32,

    /// Nucleus sampling parameter.
    pub top_p: f32,

    /// Maximum number of generated tokens.
    pub max_tokens: u32,
}

impl LlmRequest {
    /// Create a request with default generation settings.
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 1024,
        }
    }

    /// Shorthand for a single-user-message request.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![LlmMessage::user(prompt)])
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the nucleus sampling parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the generated-token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Concatenated user-visible prompt text, used for diagnostics.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
