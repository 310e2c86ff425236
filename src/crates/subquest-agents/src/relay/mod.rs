//! Identity relay for step results.
//!
//! Used when a step's output is passed through the process stage
//! unchanged; the call is still recorded in `agent_calls`, which keeps the
//! audit trail uniform.

use async_trait::async_trait;
use serde_json::Value;

use subquest_core::names::{self, stage};
use subquest_core::{Agent, AgentResult, ExecutionContext};

#[derive(Debug, Default)]
pub struct StepResultRelayAgent;

impl StepResultRelayAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for StepResultRelayAgent {
    fn name(&self) -> &str {
        names::STEP_RESULT_RELAY_AGENT
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            names::OP_RELAY_STEP_RESULT => {
                let payload = params.get("payload").cloned().unwrap_or(Value::Null);
                AgentResult::ok(stage::DATA_PROCESSING, payload)
                    .with_summary("relayed step result unchanged")
            }
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::DATA_PROCESSING,
            ),
        }
    }
}
