//! Prompt construction for the planner.

use serde_json::Value;

/// Build the decomposition prompt.
///
/// The snapshot is the sanitized tool view from the registry; the model
/// must only reference operations that appear in it.
pub fn build_plan_prompt(question: &str, tool_registry_snapshot: &Value) -> String {
    let tools = serde_json::to_string_pretty(tool_registry_snapshot).unwrap_or_default();
    format!(
        r#"You are a planning assistant. Decompose the user's question into the
smallest set of atomic sub-questions that together answer it.

Rules:
- Each sub-question must be answerable by a single tool operation from the
  registry below.
- Use `depends_on` to order sub-questions that need another one's result.
- Do not invent tools or operations.
- Prefer one sub-question when the question is already atomic.

Available tools:
{tools}

Question: {question}

Respond with JSON only, in this exact shape:
{{
  "plan": {{
    "subquestions": [
      {{"id": "q1", "text": "...", "depends_on": []}},
      {{"id": "q2", "text": "...", "depends_on": ["q1"]}}
    ]
  }}
}}"#
    )
}
