//! Executor node: run the current step's tool call.
//!
//! The executor is deliberately dumb. It derives the fully-resolved
//! `{agent, operation, params}` triple from the context, dispatches it
//! through the registry and records whatever came back. Fetch-stage calls
//! go to the tool namespace; the canonical process and validate calls go
//! to the control namespace, so a hypothesis can never smuggle in a
//! control agent.

use serde_json::json;
use tracing::debug;

use crate::context::step::Stage;
use crate::context::ExecutionContext;
use crate::registry::{AgentRegistry, Namespace};

pub async fn run(registry: &AgentRegistry, ctx: &mut ExecutionContext) {
    let Some(id) = ctx.get_current_step_id().map(str::to_string) else {
        return;
    };
    let Some(call) = ctx.get_current_tool_call(&id) else {
        return;
    };
    let namespace = match ctx.get_current_stage(&id) {
        Some(Stage::Fetch) => Namespace::Tools,
        Some(Stage::Process) | Some(Stage::Validate) => Namespace::Control,
        None => return,
    };

    debug!(step = %id, agent = %call.agent, operation = %call.operation, "executing tool call");
    let result = registry
        .dispatch(namespace, &call.agent, &call.operation, call.params, ctx)
        .await;

    let status = if result.is_ok() { "ok" } else { "error" };
    ctx.record_tool_execution_result(&id, &result);
    ctx.append_history_event(json!({
        "kind": "agent_call",
        "step": id,
        "agent": call.agent,
        "operation": call.operation,
        "status": status,
    }));
}
