//! Prompt construction for the synthesizer.

use serde_json::Value;

pub fn build_synthesis_prompt(question: &str, plan: &Value, step_outputs: &Value) -> String {
    let plan = serde_json::to_string_pretty(plan).unwrap_or_default();
    let outputs = serde_json::to_string_pretty(step_outputs).unwrap_or_default();
    format!(
        r#"You are answering the user's question from collected evidence.

Question: {question}

Plan that was executed:
{plan}

Per-sub-question outputs (by id):
{outputs}

Write a direct, complete answer to the question using only this evidence.
If the evidence only covers part of the question, answer the part it
covers and say what is missing.

Respond with JSON only:
{{"final_answer": "...", "confidence": 0.0, "reasoning": "...", "explanation": "..."}}"#
    )
}
