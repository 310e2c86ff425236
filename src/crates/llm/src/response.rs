//! Standardized response model for LLM calls.
//!
//! [`LlmResponse`] normalizes whatever a backend produced into four views of
//! the same text: the raw output, the reasoning segment (for thinking
//! models), the user-facing answer, and a parsed JSON payload when one can
//! be extracted. Control agents only ever look at `json_answer`; `raw_text`
//! and `thinking` are carried for diagnostics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Structured response from an LLM backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Complete raw model output.
    pub raw_text: String,

    /// Reasoning segment, if the model emitted `<think>` tags.
    pub thinking: String,

    /// Answer text with the reasoning segment stripped.
    pub answer: String,

    /// Parsed JSON payload, if the answer contained one.
    pub json_answer: Option<Value>,

    /// Token usage reported by the backend, zero when unknown.
    pub tokens_used: u64,

    /// Backend-specific metadata (model name, finish reason, errors).
    pub metadata: BTreeMap<String, Value>,
}

impl LlmResponse {
    /// Parse a raw model output into a structured response.
    ///
    /// Extraction rules, in order:
    /// 1. a `<think>...</think>` segment is split off into `thinking`;
    /// 2. `json_answer` is taken from the first fenced ```` ```json ````
    ///    block that parses, otherwise from the first balanced `{...}`
    ///    substring that parses;
    /// 3. if the JSON object carries an `"answer"` string field, that
    ///    becomes the `answer` text.
    pub fn from_raw(text: impl Into<String>) -> Self {
        let raw_text = text.into();
        let (thinking, mut answer) = split_thinking(&raw_text);
        let json_answer = extract_json(&answer).or_else(|| extract_json(&raw_text));

        if let Some(Value::Object(map)) = &json_answer {
            if let Some(Value::String(s)) = map.get("answer") {
                answer = s.clone();
            }
        }

        Self {
            raw_text,
            thinking,
            answer,
            json_answer,
            tokens_used: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the reported token usage.
    pub fn with_tokens_used(mut self, tokens: u64) -> Self {
        self.tokens_used = tokens;
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Split a `<think>...</think>` reasoning segment off the output.
fn split_thinking(raw: &str) -> (String, String) {
    let open = "<think>";
    let close = "</think>";
    let Some(start) = raw.find(open) else {
        return (String::new(), raw.trim().to_string());
    };
    let Some(end) = raw[start..].find(close) else {
        return (String::new(), raw.trim().to_string());
    };
    let end = start + end;
    let thinking = raw[start + open.len()..end].trim().to_string();
    let mut answer = String::new();
    answer.push_str(&raw[..start]);
    answer.push_str(&raw[end + close.len()..]);
    (thinking, answer.trim().to_string())
}

/// Extract a JSON value from free-form model output.
fn extract_json(text: &str) -> Option<Value> {
    if let Some(block) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }
    balanced_object(text).and_then(|s| serde_json::from_str(s).ok())
}

/// Content of the first fenced code block, tolerating a `json` info string.
fn fenced_block(text: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*\n?(.+?)```").expect("static fence pattern")
    });
    fence
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// First balanced `{...}` substring, string-literal aware.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
