//! The shared execution context.
//!
//! [`ExecutionContext`] is the single mutable state object threaded through
//! every node of the graph: the question, the plan, per-step execution
//! state, the history audit trail and the free-form memory map. It exposes
//! a deliberately narrow API; nodes must not reach into the internals.
//!
//! Ownership model: exactly one invocation owns a context at a time. Nodes
//! run sequentially, each mutating the context through this API and handing
//! it back to the driver. Contexts are never shared across invocations.
//!
//! # Lifecycle
//!
//! 1. the caller sets the question ([`ExecutionContext::new`]),
//! 2. the planner node sets the plan (read-only afterwards),
//! 3. step states are lazily created as steps are scheduled,
//! 4. the synthesizer stores the final answer in `memory`,
//! 5. the context is returned from `invoke` and discarded.

pub mod step;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::names;
use crate::plan::Plan;
use crate::result::AgentResult;
use self::step::{Stage, StageFlags, StepExecutionState, ValidationResult};

/// Memory key holding the final answer.
const FINAL_ANSWER_KEY: &str = "final_answer";

/// A fully-resolved tool invocation handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub agent: String,
    pub operation: String,
    pub params: Value,
}

/// Root container for one invocation's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The user's original question. Immutable once set.
    question: String,

    /// The plan DAG. Set once by the planner node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plan: Option<Plan>,

    /// Id of the step currently being driven.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_step_id: Option<String>,

    /// Per-step execution state, keyed by sub-question id.
    #[serde(default)]
    steps: HashMap<String, StepExecutionState>,

    /// Append-only audit trail.
    #[serde(default)]
    history: Vec<Value>,

    /// Final answer and inter-node scratch.
    #[serde(default)]
    memory: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Context for a question.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    // -------------------------
    // Question & plan
    // -------------------------

    pub fn get_question(&self) -> &str {
        &self.question
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.question = question.into();
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
    }

    pub fn get_plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn is_plan_set(&self) -> bool {
        self.plan.is_some()
    }

    // -------------------------
    // Current step
    // -------------------------

    pub fn get_current_step_id(&self) -> Option<&str> {
        self.current_step_id.as_deref()
    }

    pub fn set_current_step_id(&mut self, id: Option<String>) {
        self.current_step_id = id;
    }

    /// Make `id` the current step, lazily creating its state.
    pub fn start_step(&mut self, id: &str) {
        self.ensure_execution_step(id);
        self.current_step_id = Some(id.to_string());
    }

    /// Lazily create the step state for `id`. The sub-question text is
    /// snapshotted from the plan when available.
    pub fn ensure_execution_step(&mut self, id: &str) -> &mut StepExecutionState {
        if !self.steps.contains_key(id) {
            let text = self
                .plan
                .as_ref()
                .and_then(|p| p.subquestion(id))
                .map(|sq| sq.text.clone())
                .unwrap_or_default();
            self.steps
                .insert(id.to_string(), StepExecutionState::new(id, text));
        }
        self.steps.get_mut(id).expect("just inserted")
    }

    /// Read-only access to a step's state.
    pub fn step(&self, id: &str) -> Option<&StepExecutionState> {
        self.steps.get(id)
    }

    /// Mutable access to a step's state, for the reasoner's retry path.
    pub fn step_mut(&mut self, id: &str) -> Option<&mut StepExecutionState> {
        self.steps.get_mut(id)
    }

    /// All step states, keyed by id.
    pub fn steps(&self) -> &HashMap<String, StepExecutionState> {
        &self.steps
    }

    // -------------------------
    // Scheduling helpers
    // -------------------------

    /// Id of the first sub-question in plan order whose dependencies are
    /// all completed and which is not itself completed. Deterministic and
    /// independent of timing: plan order is the only tie-breaker.
    pub fn select_next_step(&self) -> Option<String> {
        let plan = self.plan.as_ref()?;
        for sq in &plan.subquestions {
            if self.is_step_fully_completed(&sq.id) {
                continue;
            }
            let ready = sq
                .depends_on
                .iter()
                .all(|dep| self.is_step_fully_completed(dep));
            if ready {
                return Some(sq.id.clone());
            }
        }
        None
    }

    /// Whether every sub-question in the plan has a completed step.
    pub fn all_steps_completed(&self) -> bool {
        match &self.plan {
            Some(plan) => plan
                .subquestions
                .iter()
                .all(|sq| self.is_step_fully_completed(&sq.id)),
            None => false,
        }
    }

    /// Whether the step is terminally done (successfully or failed).
    pub fn is_step_fully_completed(&self, id: &str) -> bool {
        self.steps.get(id).map(|s| s.completed).unwrap_or(false)
    }

    // -------------------------
    // Stages
    // -------------------------

    /// Enable stages for a step. Monotonic: flags are OR-ed in.
    pub fn set_expected_stages(&mut self, id: &str, flags: StageFlags) {
        let step = self.ensure_execution_step(id);
        step.expected.merge(flags);
        step.expected_set = true;
    }

    pub fn mark_stage_completed(&mut self, id: &str, stage: Stage) {
        self.ensure_execution_step(id)
            .completed_stages
            .set(stage, true);
    }

    pub fn is_stage_completed(&self, id: &str, stage: Stage) -> bool {
        self.steps
            .get(id)
            .map(|s| s.completed_stages.get(stage))
            .unwrap_or(false)
    }

    /// First expected-but-not-completed stage in the canonical order, or
    /// `None` when the step has nothing pending.
    pub fn get_current_stage(&self, id: &str) -> Option<Stage> {
        self.steps.get(id).and_then(|s| s.current_stage())
    }

    // -------------------------
    // Reasoner integration
    // -------------------------

    /// Store a reasoner decision: records the decision and the selected
    /// hypothesis, and derives `expected` stages from the decision flags.
    /// The decision must already have the selection override applied.
    pub fn record_reasoner_decision(&mut self, id: &str, decision: step::ReasonerDecision) {
        let expected = decision.expected_stages();
        let hypothesis = decision.selected().cloned();
        let step = self.ensure_execution_step(id);
        step.hypothesis = hypothesis;
        step.decision = Some(decision);
        step.expected.merge(expected);
        step.expected_set = true;
    }

    /// Map from each predecessor id (per `depends_on`) to its raw output.
    /// This is the only cross-step view the reasoner gets.
    pub fn get_relevant_step_outputs_for_reasoner(&self, id: &str) -> Map<String, Value> {
        let mut outputs = Map::new();
        let Some(plan) = &self.plan else {
            return outputs;
        };
        let Some(sq) = plan.subquestion(id) else {
            return outputs;
        };
        for dep in &sq.depends_on {
            let value = self
                .steps
                .get(dep)
                .and_then(|s| s.raw_output.clone())
                .unwrap_or(Value::Null);
            outputs.insert(dep.clone(), value);
        }
        outputs
    }

    // -------------------------
    // Tool-call derivation
    // -------------------------

    /// The `{agent, operation, params}` triple for the step's current
    /// stage:
    ///
    /// - `fetch`: the selected hypothesis,
    /// - `process`: the canonical data-analysis call over the raw output,
    /// - `validate`: the canonical result-validation call over the raw
    ///   output, call history and a compact step view,
    /// - nothing pending: `None`.
    pub fn get_current_tool_call(&self, id: &str) -> Option<ToolCall> {
        let step = self.steps.get(id)?;
        match step.current_stage()? {
            Stage::Fetch => step.hypothesis.as_ref().map(|h| ToolCall {
                agent: h.agent.clone(),
                operation: h.operation.clone(),
                params: h.params.clone(),
            }),
            Stage::Process => Some(ToolCall {
                agent: names::DATA_ANALYSIS_AGENT.to_string(),
                operation: names::OP_ANALYZE.to_string(),
                params: json!({
                    "subquestion_text": step.text.clone(),
                    "raw_output": step.raw_output.clone(),
                }),
            }),
            Stage::Validate => Some(ToolCall {
                agent: names::RESULT_VALIDATOR_AGENT.to_string(),
                operation: names::OP_VALIDATE_RESULT.to_string(),
                params: json!({
                    "subquestion_text": step.text.clone(),
                    "raw_output": step.raw_output.clone(),
                    "agent_calls": step.agent_calls.clone(),
                    "step_state": step.compact_view(),
                }),
            }),
        }
    }

    // -------------------------
    // Result recording
    // -------------------------

    /// Store the fetch/process payload.
    pub fn record_step_result(&mut self, id: &str, payload: Value) {
        self.ensure_execution_step(id).raw_output = Some(payload);
    }

    /// Store the validation verdict.
    pub fn record_validation_result(&mut self, id: &str, verdict: ValidationResult) {
        self.ensure_execution_step(id).validation_result = Some(verdict);
    }

    /// Append a serialized call record to the step's `agent_calls` log.
    /// The log is strictly append-only: recording the same result twice
    /// yields two entries.
    pub fn record_agent_call(&mut self, id: &str, result: &AgentResult) {
        self.ensure_execution_step(id)
            .agent_calls
            .push(result.to_value());
    }

    /// Record a dispatched tool result: always appends to `agent_calls`,
    /// then routes on the result's stage tag. On success the payload lands
    /// in `raw_output` or `validation_result` and the corresponding stage
    /// is checked off; on error the step is failed.
    ///
    /// A step is finalized here once every expected stage has completed,
    /// unless the validation verdict was negative; in that case the step
    /// stays open for the reasoner's retry decision.
    pub fn record_tool_execution_result(&mut self, id: &str, result: &AgentResult) {
        self.record_agent_call(id, result);

        if result.is_error() {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            self.mark_step_failed(id, message);
            return;
        }

        let stage_tag = result.stage_tag().to_string();
        let output = result.output.clone().unwrap_or(Value::Null);

        if stage_tag == names::stage::RESULT_VALIDATION {
            let verdict: ValidationResult =
                serde_json::from_value(output).unwrap_or(ValidationResult {
                    is_valid: false,
                    confidence: 0.0,
                    reasoning: Some("validator returned an unparseable verdict".to_string()),
                    explanation: None,
                });
            self.record_validation_result(id, verdict);
            self.mark_stage_completed(id, Stage::Validate);
        } else if stage_tag == names::stage::DATA_PROCESSING {
            self.record_step_result(id, output);
            self.mark_stage_completed(id, Stage::Process);
        } else {
            // data_fetch, entity_validation and any other tool stage feed
            // the step's raw output.
            self.record_step_result(id, output);
            self.mark_stage_completed(id, Stage::Fetch);
        }

        let step = self.ensure_execution_step(id);
        if step.expected_set && step.all_expected_completed() && !step.validation_failed() {
            step.completed = true;
            step.error = None;
            debug!(step = id, "step completed");
        }
    }

    /// Terminally fail a step.
    pub fn mark_step_failed(&mut self, id: &str, error: impl Into<String>) {
        let error = error.into();
        let step = self.ensure_execution_step(id);
        step.error = Some(error.clone());
        step.completed = true;
        debug!(step = id, error = %error, "step failed");
    }

    /// Terminally complete a step without touching its payload.
    pub fn mark_step_completed(&mut self, id: &str) {
        self.ensure_execution_step(id).completed = true;
    }

    // -------------------------
    // History
    // -------------------------

    /// Append an event to the audit trail, stamping a timestamp.
    pub fn append_history_event(&mut self, event: Value) {
        let mut event = match event {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("event".to_string(), other);
                map
            }
        };
        event.insert("timestamp".to_string(), json!(Utc::now()));
        self.history.push(Value::Object(event));
    }

    /// The audit trail, oldest first.
    pub fn history(&self) -> &[Value] {
        &self.history
    }

    /// History events whose `kind` field matches.
    pub fn history_events(&self, kind: &str) -> Vec<&Value> {
        self.history
            .iter()
            .filter(|e| e.get("kind").and_then(Value::as_str) == Some(kind))
            .collect()
    }

    // -------------------------
    // Final answer & memory
    // -------------------------

    pub fn get_final_answer(&self) -> Option<&Value> {
        self.memory.get(FINAL_ANSWER_KEY)
    }

    pub fn set_final_answer(&mut self, answer: Value) {
        self.memory.insert(FINAL_ANSWER_KEY.to_string(), answer);
    }

    /// Read a memory entry.
    pub fn memory_get(&self, key: &str) -> Option<&Value> {
        self.memory.get(key)
    }

    /// Write a memory entry.
    pub fn memory_set(&mut self, key: impl Into<String>, value: Value) {
        self.memory.insert(key.into(), value);
    }
}
