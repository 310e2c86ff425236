//! Reasoner node: decide what the current step does next.
//!
//! The node and the reasoner *agent* split responsibilities sharply: the
//! agent only builds a prompt, parses the model output and returns a
//! structured decision; everything that must be deterministic lives here.
//! That covers the selection override, the structural validation of the
//! decision, the derivation of expected stages, and the whole retry path.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::step::ReasonerDecision;
use crate::context::ExecutionContext;
use crate::names;
use crate::registry::{AgentRegistry, Namespace};

pub async fn run(registry: &AgentRegistry, ctx: &mut ExecutionContext, max_retries: u32) {
    let Some(id) = ctx.get_current_step_id().map(str::to_string) else {
        return;
    };
    ctx.ensure_execution_step(&id);
    if ctx.is_step_fully_completed(&id) {
        return;
    }

    // Retry path: a completed validate stage with a negative verdict
    // either restarts the step or force-completes it.
    let step = ctx.step(&id).expect("step ensured above");
    if step.validation_failed() {
        if step.retry_count < max_retries {
            let step = ctx.step_mut(&id).expect("step ensured above");
            step.reset_for_retry();
            let retry_count = step.retry_count;
            info!(step = %id, retry = retry_count, "validation failed, retrying");
            ctx.append_history_event(json!({
                "kind": "retry",
                "step": id.clone(),
                "retry_count": retry_count,
            }));
        } else {
            warn!(step = %id, "retry budget exhausted, force-completing");
            ctx.append_history_event(json!({
                "kind": "retry_exhausted",
                "step": id.clone(),
                "retry_count": max_retries,
            }));
            // Best effort: the step keeps its last raw output and the
            // failing verdict.
            ctx.mark_step_completed(&id);
        }
        return;
    }

    // Stages already decided and still pending: nothing to do here, the
    // executor picks up the current tool call.
    if ctx.step(&id).expect("step ensured above").decision.is_some() {
        return;
    }

    // First decision for this step (or first after a retry reset).
    let step = ctx.step(&id).expect("step ensured above");
    let subquestion = ctx
        .get_plan()
        .and_then(|p| p.subquestion(&id))
        .map(|sq| json!({"id": sq.id.clone(), "text": sq.text.clone(), "depends_on": sq.depends_on.clone()}))
        .unwrap_or_else(|| json!({"id": step.id.clone(), "text": step.text.clone(), "depends_on": []}));
    let params = json!({
        "subquestion": subquestion,
        "step_state": step.compact_view(),
        "step_outputs": ctx.get_relevant_step_outputs_for_reasoner(&id),
        "tool_registry_snapshot": registry.snapshot(),
    });

    let result = registry
        .dispatch(
            Namespace::Control,
            names::REASONER_AGENT,
            names::OP_DECIDE_NEXT_STAGE,
            params,
            ctx,
        )
        .await;

    if result.is_error() {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| "reasoner failed".to_string());
        ctx.mark_step_failed(&id, format!("reasoner error: {message}"));
        return;
    }

    let decision = result
        .output
        .clone()
        .ok_or_else(|| "reasoner returned no output".to_string())
        .and_then(|output| {
            serde_json::from_value::<ReasonerDecision>(output).map_err(|e| e.to_string())
        });
    let mut decision = match decision {
        Ok(decision) => decision,
        Err(reason) => {
            // Structural failure is non-retriable.
            ctx.mark_step_failed(&id, format!("malformed reasoner decision: {reason}"));
            return;
        }
    };
    if let Err(reason) = decision.validate_structure() {
        ctx.mark_step_failed(&id, format!("invalid reasoner decision: {reason}"));
        return;
    }

    // The engine re-selects the hypothesis no matter what the model chose.
    decision.apply_selection_override();
    let selected = decision.final_decision.selected_hypothesis;
    debug!(step = %id, selected, "reasoner decision recorded");

    ctx.record_reasoner_decision(&id, decision);
    ctx.append_history_event(json!({
        "kind": "reasoner_decision",
        "step": id.clone(),
        "selected_hypothesis": selected,
    }));

    // Nothing actionable and nothing pending: the step is done with a
    // null output.
    if selected < 0 && ctx.get_current_stage(&id).is_none() {
        info!(step = %id, "no viable hypothesis, completing with null output");
        ctx.append_history_event(json!({
            "kind": "no_viable_hypothesis",
            "step": id.clone(),
        }));
        ctx.mark_step_completed(&id);
    }
}
