//! Prompt construction for the result validator.

use serde_json::Value;

pub fn build_validation_prompt(
    subquestion_text: &str,
    raw_output: &Value,
    agent_calls: &Value,
    step_state: &Value,
) -> String {
    let output = serde_json::to_string_pretty(raw_output).unwrap_or_default();
    let calls = serde_json::to_string_pretty(agent_calls).unwrap_or_default();
    let state = serde_json::to_string_pretty(step_state).unwrap_or_default();
    format!(
        r#"You are checking whether a result actually answers a sub-question.

Sub-question: {subquestion_text}

Result to check:
{output}

Calls that produced it:
{calls}

Step state:
{state}

Judge strictly. An empty result, a result about a different entity, or a
result that only partially covers the sub-question is invalid; explain
what is wrong so the next attempt can fix its parameters.

Respond with JSON only:
{{"is_valid": true, "confidence": 0.0, "reasoning": "...", "explanation": "..."}}"#
    )
}
