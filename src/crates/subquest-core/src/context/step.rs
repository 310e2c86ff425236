//! Per-step execution state and the reasoner decision model.
//!
//! A step is the execution of one sub-question. Its lifecycle is a fixed
//! set of stages in the order `fetch -> process -> validate`; the reasoner
//! decides which of them a step needs (`expected`) and the executor checks
//! them off (`completed`). [`StepExecutionState`] holds both maps plus
//! everything the retry path needs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One stage of a step's lifecycle, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Process,
    Validate,
}

impl Stage {
    /// The canonical stage order.
    pub const ORDER: [Stage; 3] = [Stage::Fetch, Stage::Process, Stage::Validate];

    /// Stable string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Process => "process",
            Stage::Validate => "validate",
        }
    }
}

/// Boolean per-stage map used for both `expected` and `completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub fetch: bool,
    pub process: bool,
    pub validate: bool,
}

impl StageFlags {
    /// Read one flag.
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => self.fetch,
            Stage::Process => self.process,
            Stage::Validate => self.validate,
        }
    }

    /// Write one flag.
    pub fn set(&mut self, stage: Stage, value: bool) {
        match stage {
            Stage::Fetch => self.fetch = value,
            Stage::Process => self.process = value,
            Stage::Validate => self.validate = value,
        }
    }

    /// OR another flag set into this one. Used to keep `expected`
    /// monotonic: later decisions may enable stages, never disable them.
    pub fn merge(&mut self, other: StageFlags) {
        self.fetch |= other.fetch;
        self.process |= other.process;
        self.validate |= other.validate;
    }

    /// Clear all flags.
    pub fn clear(&mut self) {
        *self = StageFlags::default();
    }
}

/// A candidate tool invocation proposed by the reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Tool agent to invoke.
    pub agent: String,

    /// Operation on that agent.
    pub operation: String,

    /// Operation parameters.
    #[serde(default)]
    pub params: Value,

    /// Reasoner confidence in `[0, 1]`.
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A yes/no call with confidence, used for the postprocessing and
/// validation flags of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFlag {
    pub needed: bool,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// The reasoner's own pick, re-checked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    /// Index into `hypotheses`, or `-1` for "nothing actionable".
    pub selected_hypothesis: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Structured output of the reasoner's `decide_next_stage` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonerDecision {
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,

    pub postprocessing: DecisionFlag,

    pub validation: DecisionFlag,

    pub final_decision: FinalDecision,

    /// Audit trail of the reasoning steps. Must be non-empty.
    #[serde(default)]
    pub reasoning: Vec<String>,
}

/// Confidence threshold below which a hypothesis is never selected.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

impl ReasonerDecision {
    /// Structural validation: confidences in `[0, 1]`, non-empty
    /// reasoning. A failure here is non-retriable; the step is failed.
    pub fn validate_structure(&self) -> std::result::Result<(), String> {
        for (i, h) in self.hypotheses.iter().enumerate() {
            if !(0.0..=1.0).contains(&h.confidence) {
                return Err(format!(
                    "hypothesis {i} confidence {} out of [0, 1]",
                    h.confidence
                ));
            }
            if h.agent.trim().is_empty() || h.operation.trim().is_empty() {
                return Err(format!("hypothesis {i} has an empty agent or operation"));
            }
        }
        for (name, flag) in [
            ("postprocessing", &self.postprocessing),
            ("validation", &self.validation),
        ] {
            if !(0.0..=1.0).contains(&flag.confidence) {
                return Err(format!(
                    "{name} confidence {} out of [0, 1]",
                    flag.confidence
                ));
            }
        }
        if self.reasoning.iter().all(|r| r.trim().is_empty()) {
            return Err("reasoning trail is empty".to_string());
        }
        Ok(())
    }

    /// Deterministic selection override.
    ///
    /// Regardless of what the reasoner picked, re-select: keep hypotheses
    /// with confidence at or above [`CONFIDENCE_THRESHOLD`], take the
    /// highest confidence among survivors (lowest index on ties), or `-1`
    /// when none survive. This guards against a mis-calibrated model
    /// committing to a low-confidence path.
    pub fn apply_selection_override(&mut self) {
        let mut best: Option<(usize, f64)> = None;
        for (i, h) in self.hypotheses.iter().enumerate() {
            if h.confidence < CONFIDENCE_THRESHOLD {
                continue;
            }
            match best {
                Some((_, best_conf)) if h.confidence <= best_conf => {}
                _ => best = Some((i, h.confidence)),
            }
        }
        self.final_decision.selected_hypothesis = match best {
            Some((i, _)) => i as i64,
            None => -1,
        };
    }

    /// The selected hypothesis, if any.
    pub fn selected(&self) -> Option<&Hypothesis> {
        let index = self.final_decision.selected_hypothesis;
        if index < 0 {
            return None;
        }
        self.hypotheses.get(index as usize)
    }

    /// Expected-stage flags implied by this decision.
    pub fn expected_stages(&self) -> StageFlags {
        StageFlags {
            fetch: self.final_decision.selected_hypothesis >= 0,
            process: self.postprocessing.needed,
            validate: self.validation.needed,
        }
    }
}

/// Verdict of the result validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Mutable execution state of one sub-question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionState {
    /// Sub-question id.
    pub id: String,

    /// Sub-question text, snapshotted for prompts and logs.
    pub text: String,

    /// Stages the reasoner enabled for this step. Monotonic.
    #[serde(default)]
    pub expected: StageFlags,

    /// Whether `expected` has been set at least once.
    #[serde(default)]
    pub expected_set: bool,

    /// Stages checked off by the executor.
    #[serde(default)]
    pub completed_stages: StageFlags,

    /// Last structured reasoner decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ReasonerDecision>,

    /// The tool call selected by the deterministic override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<Hypothesis>,

    /// Payload of the fetch (or process) stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,

    /// Verdict of the validate stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,

    /// Append-only log of every dispatched call for this step.
    #[serde(default)]
    pub agent_calls: Vec<Value>,

    /// Number of retries taken so far. Bounded by the engine.
    #[serde(default)]
    pub retry_count: u32,

    /// Terminal error, when the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether the step is terminally done (successfully or not).
    #[serde(default)]
    pub completed: bool,
}

impl StepExecutionState {
    /// Fresh state for a sub-question.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            expected: StageFlags::default(),
            expected_set: false,
            completed_stages: StageFlags::default(),
            decision: None,
            hypothesis: None,
            raw_output: None,
            validation_result: None,
            agent_calls: Vec::new(),
            retry_count: 0,
            error: None,
            completed: false,
        }
    }

    /// First expected-but-not-completed stage in canonical order, or
    /// `None` when nothing is pending.
    pub fn current_stage(&self) -> Option<Stage> {
        Stage::ORDER
            .into_iter()
            .find(|&s| self.expected.get(s) && !self.completed_stages.get(s))
    }

    /// Whether every expected stage has completed.
    pub fn all_expected_completed(&self) -> bool {
        self.current_stage().is_none()
    }

    /// Whether the last validation verdict was negative.
    pub fn validation_failed(&self) -> bool {
        self.completed_stages.validate
            && self
                .validation_result
                .as_ref()
                .map(|v| !v.is_valid)
                .unwrap_or(false)
    }

    /// Reset stage progress for a retry. `expected` is kept (it never
    /// shrinks); decision and hypothesis are cleared so the reasoner is
    /// consulted again with the validation feedback in view.
    pub fn reset_for_retry(&mut self) {
        self.completed_stages.clear();
        self.raw_output = None;
        self.validation_result = None;
        self.decision = None;
        self.hypothesis = None;
        self.retry_count += 1;
    }

    /// Compact view handed to LLM-consulting operations.
    pub fn compact_view(&self) -> Value {
        json!({
            "id": self.id.clone(),
            "retry_count": self.retry_count,
            "expected": self.expected,
            "completed_stages": self.completed_stages,
            "validation_feedback": self
                .validation_result
                .as_ref()
                .and_then(|v| v.reasoning.clone()),
            "error": self.error.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypothesis(confidence: f64) -> Hypothesis {
        Hypothesis {
            agent: "BooksLibraryAgent".to_string(),
            operation: "list_books".to_string(),
            params: json!({"author": "Pushkin"}),
            confidence,
            reason: None,
            explanation: None,
        }
    }

    fn decision(confidences: &[f64]) -> ReasonerDecision {
        ReasonerDecision {
            hypotheses: confidences.iter().map(|&c| hypothesis(c)).collect(),
            postprocessing: DecisionFlag {
                needed: false,
                confidence: 0.9,
                reason: None,
                explanation: None,
            },
            validation: DecisionFlag {
                needed: true,
                confidence: 0.9,
                reason: None,
                explanation: None,
            },
            final_decision: FinalDecision {
                selected_hypothesis: 0,
                explanation: None,
            },
            reasoning: vec!["because".to_string()],
        }
    }

    #[test]
    fn override_picks_highest_confidence() {
        let mut d = decision(&[0.6, 0.9, 0.7]);
        d.final_decision.selected_hypothesis = 2; // model's own (wrong) pick
        d.apply_selection_override();
        assert_eq!(d.final_decision.selected_hypothesis, 1);
    }

    #[test]
    fn override_filters_below_threshold() {
        let mut d = decision(&[0.3, 0.3, 0.3]);
        d.apply_selection_override();
        assert_eq!(d.final_decision.selected_hypothesis, -1);
        assert!(d.selected().is_none());
    }

    #[test]
    fn override_breaks_ties_by_lowest_index() {
        let mut d = decision(&[0.8, 0.8, 0.8]);
        d.final_decision.selected_hypothesis = 2;
        d.apply_selection_override();
        assert_eq!(d.final_decision.selected_hypothesis, 0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut d = decision(&[0.5]);
        d.apply_selection_override();
        assert_eq!(d.final_decision.selected_hypothesis, 0);
    }

    #[test]
    fn expected_stages_follow_decision_flags() {
        let mut d = decision(&[0.9]);
        d.apply_selection_override();
        let flags = d.expected_stages();
        assert!(flags.fetch);
        assert!(!flags.process);
        assert!(flags.validate);

        let mut none = decision(&[0.1]);
        none.apply_selection_override();
        assert!(!none.expected_stages().fetch);
    }

    #[test]
    fn structure_rejects_out_of_range_confidence() {
        let d = decision(&[1.5]);
        assert!(d.validate_structure().is_err());
    }

    #[test]
    fn structure_rejects_empty_reasoning() {
        let mut d = decision(&[0.9]);
        d.reasoning = vec!["  ".to_string()];
        assert!(d.validate_structure().is_err());
    }

    #[test]
    fn structure_rejects_empty_agent_name() {
        let mut d = decision(&[0.9]);
        d.hypotheses[0].agent = String::new();
        assert!(d.validate_structure().is_err());
    }

    #[test]
    fn current_stage_follows_canonical_order() {
        let mut step = StepExecutionState::new("q1", "text");
        step.expected = StageFlags {
            fetch: true,
            process: true,
            validate: true,
        };
        assert_eq!(step.current_stage(), Some(Stage::Fetch));
        step.completed_stages.set(Stage::Fetch, true);
        assert_eq!(step.current_stage(), Some(Stage::Process));
        step.completed_stages.set(Stage::Process, true);
        assert_eq!(step.current_stage(), Some(Stage::Validate));
        step.completed_stages.set(Stage::Validate, true);
        assert_eq!(step.current_stage(), None);
    }

    #[test]
    fn unexpected_stages_are_skipped() {
        let mut step = StepExecutionState::new("q1", "text");
        step.expected = StageFlags {
            fetch: true,
            process: false,
            validate: true,
        };
        step.completed_stages.set(Stage::Fetch, true);
        assert_eq!(step.current_stage(), Some(Stage::Validate));
    }

    #[test]
    fn reset_for_retry_keeps_expected_and_bumps_count() {
        let mut step = StepExecutionState::new("q1", "text");
        step.expected = StageFlags {
            fetch: true,
            process: false,
            validate: true,
        };
        step.expected_set = true;
        step.completed_stages = step.expected;
        step.raw_output = Some(json!([]));
        step.validation_result = Some(ValidationResult {
            is_valid: false,
            confidence: 0.8,
            reasoning: Some("empty result".to_string()),
            explanation: None,
        });
        step.decision = Some(decision(&[0.9]));

        step.reset_for_retry();

        assert_eq!(step.retry_count, 1);
        assert!(step.expected.fetch && step.expected.validate);
        assert_eq!(step.completed_stages, StageFlags::default());
        assert!(step.raw_output.is_none());
        assert!(step.validation_result.is_none());
        assert!(step.decision.is_none());
    }

    #[test]
    fn validation_failed_requires_completed_validate_stage() {
        let mut step = StepExecutionState::new("q1", "text");
        step.validation_result = Some(ValidationResult {
            is_valid: false,
            confidence: 1.0,
            reasoning: None,
            explanation: None,
        });
        assert!(!step.validation_failed());
        step.expected.set(Stage::Validate, true);
        step.completed_stages.set(Stage::Validate, true);
        assert!(step.validation_failed());
    }

    #[test]
    fn merge_is_monotonic() {
        let mut flags = StageFlags {
            fetch: true,
            process: false,
            validate: true,
        };
        flags.merge(StageFlags {
            fetch: false,
            process: true,
            validate: false,
        });
        assert!(flags.fetch && flags.process && flags.validate);
    }
}
