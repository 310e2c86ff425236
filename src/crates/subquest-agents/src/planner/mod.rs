//! The planner agent: question in, sub-question decomposition out.

pub mod prompts;

use async_trait::async_trait;
use llm::{LlmRequest, ProfileRegistry};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use subquest_core::names::{self, stage};
use subquest_core::{Agent, AgentResult, ExecutionContext};

/// Decomposes the user's question into a plan of sub-questions, guided by
/// the sanitized tool snapshot. The engine re-validates whatever comes
/// back; this agent only prompts and parses.
pub struct PlannerAgent {
    profiles: Arc<ProfileRegistry>,
    profile: String,
}

impl PlannerAgent {
    pub fn new(profiles: Arc<ProfileRegistry>, profile: impl Into<String>) -> Self {
        Self {
            profiles,
            profile: profile.into(),
        }
    }

    async fn plan(&self, params: &Value) -> AgentResult {
        let question = params["question"].as_str().unwrap_or_default();
        let snapshot = &params["tool_registry_snapshot"];
        let prompt = prompts::build_plan_prompt(question, snapshot);

        let request = LlmRequest::from_prompt(&prompt)
            .with_temperature(0.2)
            .with_max_tokens(2048);
        let response = match crate::generate(&self.profiles, &self.profile, request).await {
            Ok(response) => response,
            Err(e) => return AgentResult::error(e.to_string(), stage::PLANNING),
        };

        let Some(payload) = response.json_answer.clone() else {
            return AgentResult::error("planner returned no parseable JSON", stage::PLANNING)
                .with_llm_diagnostics(
                    prompt,
                    response.raw_text,
                    response.thinking,
                    response.tokens_used,
                );
        };

        debug!("planner produced a decomposition");
        AgentResult::ok(stage::PLANNING, payload)
            .with_summary(format!("decomposed question into a plan: {question}"))
            .with_llm_diagnostics(
                prompt,
                response.raw_text,
                response.thinking,
                response.tokens_used,
            )
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        names::PLANNER_AGENT
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            names::OP_PLAN => self.plan(&params).await,
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::PLANNING,
            ),
        }
    }
}
