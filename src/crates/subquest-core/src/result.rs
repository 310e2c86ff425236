//! The uniform result envelope every agent operation returns.
//!
//! [`AgentResult`] is the standard contract across the whole system. It
//! carries not just data but the semantic context of what was done (stage
//! tag, summary, input params) so the reasoner can make informed decisions,
//! plus LLM diagnostics when an operation consulted a model.
//!
//! Two fields are deliberately *not* set by operations: `agent` and
//! `operation` are stamped by the dispatcher in
//! [`crate::registry::AgentRegistry::dispatch`], together with
//! `metadata.elapsed_ms`. Serialization skips empty fields so logs and
//! `agent_calls` entries stay clean.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Error,
}

/// Universal result of one agent operation.
///
/// # Examples
///
/// ```rust
/// use subquest_core::{AgentResult, names::stage};
/// use serde_json::json;
///
/// let result = AgentResult::ok(stage::DATA_FETCH, json!([{"title": "Eugene Onegin"}]))
///     .with_summary("fetched 1 book");
/// assert!(result.is_ok());
/// assert_eq!(result.stage.as_deref(), Some("data_fetch"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// `ok` or `error`.
    pub status: ResultStatus,

    /// Lifecycle phase that produced this result, see [`crate::names::stage`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Agent name, stamped by the dispatcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Operation name, stamped by the dispatcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Parameters the operation was invoked with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_params: Option<Value>,

    /// Main structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Short human-readable account of what was done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Error text when `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Model reasoning segment, when the operation consulted an LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Prompt sent to the LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Raw LLM output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,

    /// Token usage reported by the LLM backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,

    /// Free-form metadata (elapsed time, source, limits hit).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Creation timestamp.
    pub ts: DateTime<Utc>,
}

impl AgentResult {
    /// Create a successful result for the given lifecycle stage.
    pub fn ok(stage: impl Into<String>, output: Value) -> Self {
        Self {
            status: ResultStatus::Ok,
            stage: Some(stage.into()),
            agent: None,
            operation: None,
            input_params: None,
            output: Some(output),
            summary: None,
            error: None,
            thinking: None,
            prompt: None,
            raw_response: None,
            tokens_used: None,
            metadata: Map::new(),
            ts: Utc::now(),
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            stage: Some(stage.into()),
            agent: None,
            operation: None,
            input_params: None,
            output: None,
            summary: None,
            error: Some(message.into()),
            thinking: None,
            prompt: None,
            raw_response: None,
            tokens_used: None,
            metadata: Map::new(),
            ts: Utc::now(),
        }
    }

    /// Attach a human-readable summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Record the parameters the operation ran with.
    pub fn with_input_params(mut self, params: Value) -> Self {
        self.input_params = Some(params);
        self
    }

    /// Attach LLM diagnostics in one go.
    pub fn with_llm_diagnostics(
        mut self,
        prompt: impl Into<String>,
        raw_response: impl Into<String>,
        thinking: impl Into<String>,
        tokens_used: u64,
    ) -> Self {
        self.prompt = Some(prompt.into());
        self.raw_response = Some(raw_response.into());
        let thinking = thinking.into();
        if !thinking.is_empty() {
            self.thinking = Some(thinking);
        }
        if tokens_used > 0 {
            self.tokens_used = Some(tokens_used);
        }
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }

    /// Whether the operation failed.
    pub fn is_error(&self) -> bool {
        self.status == ResultStatus::Error
    }

    /// Stage tag, empty string when unset.
    pub fn stage_tag(&self) -> &str {
        self.stage.as_deref().unwrap_or("")
    }

    /// Serialize to a plain JSON value, omitting unset fields.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::stage;
    use serde_json::json;

    #[test]
    fn ok_constructor_sets_status_and_stage() {
        let result = AgentResult::ok(stage::DATA_FETCH, json!([1, 2]));
        assert!(result.is_ok());
        assert_eq!(result.stage_tag(), "data_fetch");
        assert_eq!(result.output, Some(json!([1, 2])));
        assert!(result.error.is_none());
    }

    #[test]
    fn error_constructor_sets_message() {
        let result = AgentResult::error("boom", stage::REASONING);
        assert!(result.is_error());
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.output.is_none());
    }

    #[test]
    fn serialization_omits_null_fields() {
        let value = AgentResult::ok(stage::DATA_FETCH, json!(null)).to_value();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("agent"));
        assert!(!obj.contains_key("operation"));
        assert!(!obj.contains_key("error"));
        assert!(!obj.contains_key("summary"));
        assert!(!obj.contains_key("metadata"));
        assert!(obj.contains_key("status"));
        assert!(obj.contains_key("ts"));
    }

    #[test]
    fn llm_diagnostics_skip_empty_thinking() {
        let result =
            AgentResult::ok(stage::REASONING, json!({})).with_llm_diagnostics("p", "r", "", 0);
        assert!(result.thinking.is_none());
        assert!(result.tokens_used.is_none());
        assert_eq!(result.prompt.as_deref(), Some("p"));
    }

    #[test]
    fn round_trips_through_serde() {
        let result = AgentResult::ok(stage::SYNTHESIS, json!({"final_answer": "x"}))
            .with_summary("done")
            .with_metadata("elapsed_ms", json!(12));
        let value = result.to_value();
        let back: AgentResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
