//! Planner node: question in, plan DAG out.
//!
//! Calls the planner control agent once with the question and the sanitized
//! tool snapshot, validates the returned decomposition and stores it on the
//! context. Planning failures are not fatal: the node falls back to a
//! trivial single-step plan whose sole sub-question is the original
//! question, so the downstream stages still run.

use serde_json::json;
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::names;
use crate::plan::Plan;
use crate::registry::{AgentRegistry, Namespace};

pub async fn run(registry: &AgentRegistry, ctx: &mut ExecutionContext) {
    if ctx.is_plan_set() {
        return;
    }

    let question = ctx.get_question().to_string();
    let params = json!({
        "question": question.clone(),
        "tool_registry_snapshot": registry.snapshot(),
    });

    let result = registry
        .dispatch(
            Namespace::Control,
            names::PLANNER_AGENT,
            names::OP_PLAN,
            params,
            ctx,
        )
        .await;

    if result.is_ok() {
        let parsed = result
            .output
            .as_ref()
            .ok_or_else(|| "planner returned no output".to_string())
            .and_then(|output| {
                Plan::from_planner_output(output).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(plan) => {
                info!(plan_id = %plan.plan_id, steps = plan.len(), "plan created");
                ctx.append_history_event(json!({
                    "kind": "plan_created",
                    "plan_id": plan.plan_id.clone(),
                    "steps": plan.len(),
                }));
                ctx.set_plan(plan);
                return;
            }
            Err(reason) => fallback(ctx, &question, &reason),
        }
    } else {
        let reason = result
            .error
            .unwrap_or_else(|| "planner operation failed".to_string());
        fallback(ctx, &question, &reason);
    }
}

/// Install the trivial single-step plan and record why.
fn fallback(ctx: &mut ExecutionContext, question: &str, reason: &str) {
    warn!(reason, "planner failed, falling back to single-step plan");
    let plan = Plan::single_step(question);
    ctx.append_history_event(json!({
        "kind": "plan_fallback",
        "plan_id": plan.plan_id.clone(),
        "reason": reason,
    }));
    ctx.set_plan(plan);
}
