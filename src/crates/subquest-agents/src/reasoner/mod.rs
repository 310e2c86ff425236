//! The reasoner agent: propose tool-call hypotheses for one sub-question.
//!
//! Only parsing and structural checks happen here. The deterministic
//! selection override, the expected-stage derivation and the retry policy
//! are the engine's job; this agent returns exactly what the model said,
//! reshaped into the decision schema.

pub mod prompts;

use async_trait::async_trait;
use llm::{LlmRequest, ProfileRegistry};
use serde_json::Value;
use std::sync::Arc;

use subquest_core::names::{self, stage};
use subquest_core::{Agent, AgentResult, ExecutionContext, ReasonerDecision};

pub struct ReasonerAgent {
    profiles: Arc<ProfileRegistry>,
    profile: String,
}

impl ReasonerAgent {
    pub fn new(profiles: Arc<ProfileRegistry>, profile: impl Into<String>) -> Self {
        Self {
            profiles,
            profile: profile.into(),
        }
    }

    async fn decide_next_stage(&self, params: &Value) -> AgentResult {
        let prompt = prompts::build_decision_prompt(
            &params["subquestion"],
            &params["step_state"],
            params.get("step_outputs").unwrap_or(&Value::Null),
            &params["tool_registry_snapshot"],
        );

        let request = LlmRequest::from_prompt(&prompt)
            .with_temperature(0.1)
            .with_max_tokens(2048);
        let response = match crate::generate(&self.profiles, &self.profile, request).await {
            Ok(response) => response,
            Err(e) => return AgentResult::error(e.to_string(), stage::REASONING),
        };

        let Some(payload) = response.json_answer.clone() else {
            return AgentResult::error("reasoner returned no parseable JSON", stage::REASONING)
                .with_llm_diagnostics(
                    prompt,
                    response.raw_text,
                    response.thinking,
                    response.tokens_used,
                );
        };

        // Parse into the decision schema so malformed shapes fail here,
        // with the diagnostics attached, rather than deeper in the engine.
        let decision: ReasonerDecision = match serde_json::from_value(payload) {
            Ok(decision) => decision,
            Err(e) => {
                return AgentResult::error(
                    format!("malformed decision from model: {e}"),
                    stage::REASONING,
                )
                .with_llm_diagnostics(
                    prompt,
                    response.raw_text,
                    response.thinking,
                    response.tokens_used,
                );
            }
        };

        let summary = format!(
            "proposed {} hypothesis(es), postprocessing={}, validation={}",
            decision.hypotheses.len(),
            decision.postprocessing.needed,
            decision.validation.needed,
        );
        AgentResult::ok(
            stage::REASONING,
            serde_json::to_value(&decision).unwrap_or(Value::Null),
        )
        .with_summary(summary)
        .with_llm_diagnostics(
            prompt,
            response.raw_text,
            response.thinking,
            response.tokens_used,
        )
    }
}

#[async_trait]
impl Agent for ReasonerAgent {
    fn name(&self) -> &str {
        names::REASONER_AGENT
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            names::OP_DECIDE_NEXT_STAGE => self.decide_next_stage(&params).await,
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::REASONING,
            ),
        }
    }
}
