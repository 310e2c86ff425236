//! Prompt construction for the data-analysis agent.

use serde_json::Value;

pub fn build_analysis_prompt(subquestion_text: &str, raw_output: &Value) -> String {
    let data = serde_json::to_string_pretty(raw_output).unwrap_or_default();
    format!(
        r#"You are reducing raw tool output into the answer of a sub-question.

Sub-question: {subquestion_text}

Raw data:
{data}

Extract or aggregate exactly what the sub-question asks for. Keep the
result structured (an object or an array), not prose.

Respond with JSON only:
{{"analysis": <the processed result>}}"#
    )
}
