//! Prompt construction for the reasoner.

use serde_json::Value;

/// Build the decide-next-stage prompt.
///
/// `step_state` carries retry count and validation feedback so the model
/// can adjust parameters after a failed attempt; `step_outputs` holds the
/// raw outputs of the sub-question's dependencies.
pub fn build_decision_prompt(
    subquestion: &Value,
    step_state: &Value,
    step_outputs: &Value,
    tool_registry_snapshot: &Value,
) -> String {
    let text = subquestion["text"].as_str().unwrap_or_default();
    let tools = serde_json::to_string_pretty(tool_registry_snapshot).unwrap_or_default();
    let state = serde_json::to_string_pretty(step_state).unwrap_or_default();
    let outputs = serde_json::to_string_pretty(step_outputs).unwrap_or_default();
    format!(
        r#"You are a reasoning assistant deciding how to answer one sub-question.

Sub-question: {text}

Outputs of prerequisite sub-questions (by id):
{outputs}

Current step state (retry count, validation feedback from a prior attempt):
{state}

Available tools:
{tools}

Propose up to three candidate tool calls (hypotheses), each with a
confidence in [0, 1]. If a prior attempt was rejected, adjust the
parameters based on the feedback. Decide whether the fetched data needs
postprocessing and whether the result needs validation.

Respond with JSON only:
{{
  "hypotheses": [
    {{"agent": "...", "operation": "...", "params": {{}}, "confidence": 0.0,
      "reason": "...", "explanation": "..."}}
  ],
  "postprocessing": {{"needed": false, "confidence": 0.0, "reason": "..."}},
  "validation": {{"needed": true, "confidence": 0.0, "reason": "..."}},
  "final_decision": {{"selected_hypothesis": 0, "explanation": "..."}},
  "reasoning": ["step by step notes"]
}}"#
    )
}
