//! The data-analysis agent behind the canonical process stage.
//!
//! Takes a step's raw output and reduces it into what the sub-question
//! actually asked for (a summary, an aggregate, a single picked item).

pub mod prompts;

use async_trait::async_trait;
use llm::{LlmRequest, ProfileRegistry};
use serde_json::Value;
use std::sync::Arc;

use subquest_core::names::{self, stage};
use subquest_core::{Agent, AgentResult, ExecutionContext};

pub struct DataAnalysisAgent {
    profiles: Arc<ProfileRegistry>,
    profile: String,
}

impl DataAnalysisAgent {
    pub fn new(profiles: Arc<ProfileRegistry>, profile: impl Into<String>) -> Self {
        Self {
            profiles,
            profile: profile.into(),
        }
    }

    async fn analyze(&self, params: &Value) -> AgentResult {
        let subquestion_text = params["subquestion_text"].as_str().unwrap_or_default();
        let raw_output = params.get("raw_output").unwrap_or(&Value::Null);
        let prompt = prompts::build_analysis_prompt(subquestion_text, raw_output);

        let request = LlmRequest::from_prompt(&prompt)
            .with_temperature(0.2)
            .with_max_tokens(2048);
        let response = match crate::generate(&self.profiles, &self.profile, request).await {
            Ok(response) => response,
            Err(e) => return AgentResult::error(e.to_string(), stage::DATA_PROCESSING),
        };

        // `analysis` is the processed payload; without it, fall back to
        // the whole JSON object, and failing that pass the raw data
        // through untouched.
        let output = response
            .json_answer
            .as_ref()
            .and_then(|payload| payload.get("analysis").cloned())
            .or_else(|| response.json_answer.clone())
            .unwrap_or_else(|| raw_output.clone());

        AgentResult::ok(stage::DATA_PROCESSING, output)
            .with_summary(format!("processed data for: {subquestion_text}"))
            .with_llm_diagnostics(
                prompt,
                response.raw_text,
                response.thinking,
                response.tokens_used,
            )
    }
}

#[async_trait]
impl Agent for DataAnalysisAgent {
    fn name(&self) -> &str {
        names::DATA_ANALYSIS_AGENT
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            names::OP_ANALYZE => self.analyze(&params).await,
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::DATA_PROCESSING,
            ),
        }
    }
}
