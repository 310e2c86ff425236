//! Canonical agent, operation and stage-tag names.
//!
//! The engine refers to control agents by name; the default catalog and any
//! embedder-supplied registry must register them under these names.

/// Control agent that decomposes the question into a plan.
pub const PLANNER_AGENT: &str = "PlannerAgent";

/// Control agent that decides the next stage for a step.
pub const REASONER_AGENT: &str = "ReasonerAgent";

/// Control agent that builds the final answer.
pub const SYNTHESIZER_AGENT: &str = "SynthesizerAgent";

/// Control agent behind the canonical validate-stage call.
pub const RESULT_VALIDATOR_AGENT: &str = "ResultValidatorAgent";

/// Control agent behind the canonical process-stage call.
pub const DATA_ANALYSIS_AGENT: &str = "DataAnalysisAgent";

/// Control agent that relays a step result unchanged.
pub const STEP_RESULT_RELAY_AGENT: &str = "StepResultRelayAgent";

/// Operation names the engine dispatches by itself.
pub const OP_PLAN: &str = "plan";
pub const OP_DECIDE_NEXT_STAGE: &str = "decide_next_stage";
pub const OP_VALIDATE_RESULT: &str = "validate_result";
pub const OP_SYNTHESIZE: &str = "synthesize";
pub const OP_ANALYZE: &str = "analyze";
pub const OP_RELAY_STEP_RESULT: &str = "relay_step_result";

/// Lifecycle stage tags carried by [`crate::AgentResult::stage`].
pub mod stage {
    pub const PLANNING: &str = "planning";
    pub const REASONING: &str = "reasoning";
    pub const DATA_FETCH: &str = "data_fetch";
    pub const DATA_PROCESSING: &str = "data_processing";
    pub const RESULT_VALIDATION: &str = "result_validation";
    pub const SYNTHESIS: &str = "synthesis";
    pub const ENTITY_VALIDATION: &str = "entity_validation";
}
