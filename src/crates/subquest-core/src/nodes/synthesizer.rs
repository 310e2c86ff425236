//! Synthesizer node: aggregate step outputs into the final answer.
//!
//! Runs once, after the scheduler has no step left to hand out. The
//! synthesizer agent sees the question, the plan and the outputs of every
//! completed step. Failure is absorbed in layers:
//!
//! - synthesizer unavailable or erroring: fall back to the last completed
//!   step's output coerced to a string, with a `synthesis_fallback` event;
//! - every step failed: the canonical `"could not produce an answer"`,
//!   with per-step errors enumerated in `memory.failure_reasons`.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::names;
use crate::registry::{AgentRegistry, Namespace};

/// Canonical answer when no step produced anything usable.
pub const NO_ANSWER: &str = "could not produce an answer";

pub async fn run(registry: &AgentRegistry, ctx: &mut ExecutionContext) {
    if ctx.get_final_answer().is_some() {
        return;
    }

    let step_outputs = completed_outputs(ctx);

    if step_outputs.is_empty() {
        let reasons: Map<String, Value> = ctx
            .steps()
            .iter()
            .map(|(id, step)| {
                let reason = step
                    .error
                    .clone()
                    .unwrap_or_else(|| "no output produced".to_string());
                (id.clone(), json!(reason))
            })
            .collect();
        warn!("all steps failed, emitting canonical failure answer");
        ctx.memory_set("failure_reasons", Value::Object(reasons));
        ctx.append_history_event(json!({"kind": "synthesis_failed"}));
        ctx.set_final_answer(json!(NO_ANSWER));
        return;
    }

    let params = json!({
        "question": ctx.get_question(),
        "plan": ctx.get_plan(),
        "step_outputs": step_outputs,
    });
    let result = registry
        .dispatch(
            Namespace::Control,
            names::SYNTHESIZER_AGENT,
            names::OP_SYNTHESIZE,
            params,
            ctx,
        )
        .await;

    let status = if result.is_ok() { "ok" } else { "error" };
    ctx.append_history_event(json!({
        "kind": "agent_call",
        "agent": names::SYNTHESIZER_AGENT,
        "operation": names::OP_SYNTHESIZE,
        "status": status,
    }));

    let answer = result
        .output
        .as_ref()
        .filter(|_| result.is_ok())
        .and_then(|output| output.get("final_answer").cloned())
        .filter(|answer| !answer.is_null());

    match answer {
        Some(answer) => {
            info!("final answer synthesized");
            ctx.append_history_event(json!({"kind": "synthesis"}));
            ctx.set_final_answer(answer);
        }
        None => {
            // Last completed step's output, coerced to a string.
            let fallback = last_completed_output(ctx)
                .map(coerce_to_string)
                .unwrap_or_else(|| NO_ANSWER.to_string());
            warn!("synthesizer unavailable, falling back to last step output");
            ctx.append_history_event(json!({
                "kind": "synthesis_fallback",
                "reason": result.error.unwrap_or_else(|| "no final_answer in output".to_string()),
            }));
            ctx.set_final_answer(json!(fallback));
        }
    }
}

/// Outputs of completed, non-failed steps keyed by id.
fn completed_outputs(ctx: &ExecutionContext) -> Map<String, Value> {
    let mut outputs = Map::new();
    let Some(plan) = ctx.get_plan() else {
        return outputs;
    };
    for sq in &plan.subquestions {
        let Some(step) = ctx.step(&sq.id) else {
            continue;
        };
        if step.completed && step.error.is_none() {
            if let Some(output) = &step.raw_output {
                outputs.insert(sq.id.clone(), output.clone());
            }
        }
    }
    outputs
}

/// Output of the last (in plan order) completed step that produced one.
fn last_completed_output(ctx: &ExecutionContext) -> Option<Value> {
    let plan = ctx.get_plan()?;
    plan.subquestions
        .iter()
        .rev()
        .filter_map(|sq| ctx.step(&sq.id))
        .filter(|step| step.completed && step.error.is_none())
        .find_map(|step| step.raw_output.clone())
}

fn coerce_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
