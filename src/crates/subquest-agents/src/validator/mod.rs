//! The result validator: does this output actually answer the
//! sub-question?
//!
//! Runs at temperature 0 so a given input always yields the same verdict.

pub mod prompts;

use async_trait::async_trait;
use llm::{LlmRequest, ProfileRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

use subquest_core::names::{self, stage};
use subquest_core::{Agent, AgentResult, ExecutionContext};

pub struct ResultValidatorAgent {
    profiles: Arc<ProfileRegistry>,
    profile: String,
}

impl ResultValidatorAgent {
    pub fn new(profiles: Arc<ProfileRegistry>, profile: impl Into<String>) -> Self {
        Self {
            profiles,
            profile: profile.into(),
        }
    }

    async fn validate_result(&self, params: &Value) -> AgentResult {
        let prompt = prompts::build_validation_prompt(
            params["subquestion_text"].as_str().unwrap_or_default(),
            params.get("raw_output").unwrap_or(&Value::Null),
            params.get("agent_calls").unwrap_or(&Value::Null),
            params.get("step_state").unwrap_or(&Value::Null),
        );

        // Deterministic by contract: temperature 0.
        let request = LlmRequest::from_prompt(&prompt)
            .with_temperature(0.0)
            .with_max_tokens(1024);
        let response = match crate::generate(&self.profiles, &self.profile, request).await {
            Ok(response) => response,
            Err(e) => return AgentResult::error(e.to_string(), stage::RESULT_VALIDATION),
        };

        let verdict = response
            .json_answer
            .as_ref()
            .and_then(|payload| payload.get("is_valid"))
            .and_then(Value::as_bool);
        let Some(is_valid) = verdict else {
            return AgentResult::error(
                "validator returned no is_valid verdict",
                stage::RESULT_VALIDATION,
            )
            .with_llm_diagnostics(
                prompt,
                response.raw_text,
                response.thinking,
                response.tokens_used,
            );
        };

        let payload = response.json_answer.clone().unwrap_or(Value::Null);
        let output = json!({
            "is_valid": is_valid,
            "confidence": payload.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
            "reasoning": payload.get("reasoning").cloned().unwrap_or(Value::Null),
            "explanation": payload.get("explanation").cloned().unwrap_or(Value::Null),
        });
        AgentResult::ok(stage::RESULT_VALIDATION, output)
            .with_summary(if is_valid {
                "result accepted"
            } else {
                "result rejected"
            })
            .with_llm_diagnostics(
                prompt,
                response.raw_text,
                response.thinking,
                response.tokens_used,
            )
    }
}

#[async_trait]
impl Agent for ResultValidatorAgent {
    fn name(&self) -> &str {
        names::RESULT_VALIDATOR_AGENT
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            names::OP_VALIDATE_RESULT => self.validate_result(&params).await,
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::RESULT_VALIDATION,
            ),
        }
    }
}
