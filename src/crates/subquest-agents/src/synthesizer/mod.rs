//! The synthesizer: aggregate step outputs into the final answer.

pub mod prompts;

use async_trait::async_trait;
use llm::{LlmRequest, ProfileRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

use subquest_core::names::{self, stage};
use subquest_core::{Agent, AgentResult, ExecutionContext};

pub struct SynthesizerAgent {
    profiles: Arc<ProfileRegistry>,
    profile: String,
}

impl SynthesizerAgent {
    pub fn new(profiles: Arc<ProfileRegistry>, profile: impl Into<String>) -> Self {
        Self {
            profiles,
            profile: profile.into(),
        }
    }

    async fn synthesize(&self, params: &Value) -> AgentResult {
        let prompt = prompts::build_synthesis_prompt(
            params["question"].as_str().unwrap_or_default(),
            params.get("plan").unwrap_or(&Value::Null),
            params.get("step_outputs").unwrap_or(&Value::Null),
        );

        let request = LlmRequest::from_prompt(&prompt)
            .with_temperature(0.3)
            .with_max_tokens(2048);
        let response = match crate::generate(&self.profiles, &self.profile, request).await {
            Ok(response) => response,
            Err(e) => return AgentResult::error(e.to_string(), stage::SYNTHESIS),
        };

        // Prefer the structured payload; a plain-text answer still counts,
        // it just carries lower confidence.
        let output = match response.json_answer.clone() {
            Some(payload) if payload.get("final_answer").is_some() => payload,
            _ if !response.answer.trim().is_empty() => json!({
                "final_answer": response.answer.trim(),
                "confidence": 0.5,
                "reasoning": "unstructured model output",
            }),
            _ => {
                return AgentResult::error(
                    "synthesizer produced neither JSON nor text",
                    stage::SYNTHESIS,
                )
                .with_llm_diagnostics(
                    prompt,
                    response.raw_text,
                    response.thinking,
                    response.tokens_used,
                );
            }
        };

        AgentResult::ok(stage::SYNTHESIS, output)
            .with_summary("final answer synthesized")
            .with_llm_diagnostics(
                prompt,
                response.raw_text,
                response.thinking,
                response.tokens_used,
            )
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &str {
        names::SYNTHESIZER_AGENT
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            names::OP_SYNTHESIZE => self.synthesize(&params).await,
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::SYNTHESIS,
            ),
        }
    }
}
