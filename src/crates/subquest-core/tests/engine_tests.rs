//! End-to-end engine tests with scripted agents.
//!
//! Every scenario builds a registry out of scripted doubles, runs one
//! `invoke` and asserts on the returned context. No network, no model:
//! the scripts pin down exactly what the engine does around them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use subquest_core::names::{self, stage};
use subquest_core::nodes::synthesizer::NO_ANSWER;
use subquest_core::{
    Agent, AgentRegistry, AgentResult, CancelToken, Engine, EngineConfig, ExecutionContext,
    Namespace, OperationKind,
};
use subquest_core::registry::{AgentDescriptor, AgentRegistration, OperationSpec, ParamSpec};

// -------------------------
// Scripted agent double
// -------------------------

struct ScriptedAgent {
    name: String,
    results: Mutex<VecDeque<AgentResult>>,
    last: Mutex<Option<AgentResult>>,
    repeat_last: bool,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedAgent {
    fn new(name: &str, results: Vec<AgentResult>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            results: Mutex::new(results.into()),
            last: Mutex::new(None),
            repeat_last: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn repeating(name: &str, results: Vec<AgentResult>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            results: Mutex::new(results.into()),
            last: Mutex::new(None),
            repeat_last: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), params));
        let next = self.results.lock().unwrap().pop_front();
        match next {
            Some(result) => {
                *self.last.lock().unwrap() = Some(result.clone());
                result
            }
            None if self.repeat_last => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| AgentResult::error("script exhausted", "dispatch")),
            None => AgentResult::error("script exhausted", "dispatch"),
        }
    }
}

// -------------------------
// Registry assembly
// -------------------------

fn registration(
    name: &str,
    operations: Vec<OperationSpec>,
    agent: Arc<ScriptedAgent>,
) -> AgentRegistration {
    AgentRegistration::new(
        AgentDescriptor::new(name, name, format!("scripted {name}"), "tests::ScriptedAgent"),
        operations,
        Arc::new(move |_| Ok(agent.clone() as Arc<dyn Agent>)),
    )
}

fn planner_ops() -> Vec<OperationSpec> {
    vec![OperationSpec::new(
        names::OP_PLAN,
        OperationKind::Control,
        stage::PLANNING,
        "decompose the question",
    )
    .with_params(vec![
        ParamSpec::required("question", "string"),
        ParamSpec::required("tool_registry_snapshot", "object"),
    ])]
}

fn reasoner_ops() -> Vec<OperationSpec> {
    vec![OperationSpec::new(
        names::OP_DECIDE_NEXT_STAGE,
        OperationKind::Control,
        stage::REASONING,
        "decide the next stage",
    )
    .with_params(vec![
        ParamSpec::required("subquestion", "object"),
        ParamSpec::required("step_state", "object"),
        ParamSpec::optional("step_outputs", "object"),
        ParamSpec::required("tool_registry_snapshot", "object"),
    ])]
}

fn validator_ops() -> Vec<OperationSpec> {
    vec![OperationSpec::new(
        names::OP_VALIDATE_RESULT,
        OperationKind::Validation,
        stage::RESULT_VALIDATION,
        "validate a step result",
    )
    .with_params(vec![
        ParamSpec::required("subquestion_text", "string"),
        ParamSpec::optional("raw_output", "any"),
        ParamSpec::optional("agent_calls", "array"),
        ParamSpec::optional("step_state", "object"),
    ])]
}

fn synthesizer_ops() -> Vec<OperationSpec> {
    vec![OperationSpec::new(
        names::OP_SYNTHESIZE,
        OperationKind::Control,
        stage::SYNTHESIS,
        "synthesize the final answer",
    )
    .with_params(vec![
        ParamSpec::required("question", "string"),
        ParamSpec::required("plan", "object"),
        ParamSpec::required("step_outputs", "object"),
    ])]
}

fn library_ops() -> Vec<OperationSpec> {
    vec![OperationSpec::new(
        "list_books",
        OperationKind::Direct,
        stage::DATA_FETCH,
        "list books by author",
    )
    .with_params(vec![ParamSpec::required("author", "string")])]
}

struct Fixture {
    registry: Arc<AgentRegistry>,
    planner: Arc<ScriptedAgent>,
    reasoner: Arc<ScriptedAgent>,
    library: Arc<ScriptedAgent>,
}

fn fixture(
    planner: Arc<ScriptedAgent>,
    reasoner: Arc<ScriptedAgent>,
    validator: Arc<ScriptedAgent>,
    synthesizer: Arc<ScriptedAgent>,
    library: Arc<ScriptedAgent>,
) -> Fixture {
    let mut registry = AgentRegistry::new();
    registry.register_control(registration(
        names::PLANNER_AGENT,
        planner_ops(),
        planner.clone(),
    ));
    registry.register_control(registration(
        names::REASONER_AGENT,
        reasoner_ops(),
        reasoner.clone(),
    ));
    registry.register_control(registration(
        names::RESULT_VALIDATOR_AGENT,
        validator_ops(),
        validator.clone(),
    ));
    registry.register_control(registration(
        names::SYNTHESIZER_AGENT,
        synthesizer_ops(),
        synthesizer.clone(),
    ));
    registry.register_tool(registration(
        "BooksLibraryAgent",
        library_ops(),
        library.clone(),
    ));
    Fixture {
        registry: Arc::new(registry),
        planner,
        reasoner,
        library,
    }
}

// -------------------------
// Scripted payload builders
// -------------------------

fn plan_result(subquestions: Value) -> AgentResult {
    AgentResult::ok(stage::PLANNING, json!({"plan": {"subquestions": subquestions}}))
}

fn decision_result(
    hypothesis_params: Value,
    confidence: f64,
    process_needed: bool,
    validate_needed: bool,
) -> AgentResult {
    decision_result_multi(
        vec![json!({
            "agent": "BooksLibraryAgent",
            "operation": "list_books",
            "params": hypothesis_params,
            "confidence": confidence,
        })],
        process_needed,
        validate_needed,
    )
}

fn decision_result_multi(
    hypotheses: Vec<Value>,
    process_needed: bool,
    validate_needed: bool,
) -> AgentResult {
    AgentResult::ok(
        stage::REASONING,
        json!({
            "hypotheses": hypotheses,
            "postprocessing": {"needed": process_needed, "confidence": 0.9},
            "validation": {"needed": validate_needed, "confidence": 0.9},
            "final_decision": {"selected_hypothesis": 0},
            "reasoning": ["scripted decision"],
        }),
    )
}

fn verdict_result(is_valid: bool, confidence: f64) -> AgentResult {
    AgentResult::ok(
        stage::RESULT_VALIDATION,
        json!({"is_valid": is_valid, "confidence": confidence, "reasoning": "scripted"}),
    )
}

fn books_result(titles: &[&str]) -> AgentResult {
    let books: Vec<Value> = titles.iter().map(|t| json!({"title": t})).collect();
    AgentResult::ok(stage::DATA_FETCH, json!(books))
}

fn synthesis_result(answer: &str) -> AgentResult {
    AgentResult::ok(
        stage::SYNTHESIS,
        json!({"final_answer": answer, "confidence": 0.9, "reasoning": "scripted"}),
    )
}

fn agent_call_events(ctx: &ExecutionContext) -> Vec<(String, String)> {
    ctx.history_events("agent_call")
        .iter()
        .map(|e| {
            (
                e["agent"].as_str().unwrap_or_default().to_string(),
                e["operation"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

// -------------------------
// Scenario A: single step, success
// -------------------------

#[tokio::test]
async fn scenario_a_single_step_success() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "List the books written by Pushkin", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Pushkin"}), 0.9, false, true)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![verdict_result(true, 0.95)]),
        ScriptedAgent::new(
            names::SYNTHESIZER_AGENT,
            vec![synthesis_result(
                "Pushkin wrote Eugene Onegin and Ruslan and Ludmila.",
            )],
        ),
        ScriptedAgent::new(
            "BooksLibraryAgent",
            vec![books_result(&["Eugene Onegin", "Ruslan and Ludmila"])],
        ),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine
        .invoke(ExecutionContext::new("List the books written by Pushkin"))
        .await;

    let answer = ctx.get_final_answer().unwrap().as_str().unwrap();
    assert!(answer.contains("Eugene Onegin"));
    assert!(answer.contains("Ruslan and Ludmila"));

    // Three dispatched calls: list_books, validate_result, synthesize.
    let calls = agent_call_events(&ctx);
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].1, "list_books");
    assert_eq!(calls[1].1, names::OP_VALIDATE_RESULT);
    assert_eq!(calls[2].1, names::OP_SYNTHESIZE);

    let step = ctx.step("q1").unwrap();
    assert!(step.completed);
    assert!(step.error.is_none());
    assert_eq!(step.retry_count, 0);
    assert_eq!(step.agent_calls.len(), 2);

    // The fetch params flowed through the hypothesis untouched.
    assert_eq!(
        f.library.calls()[0].1,
        json!({"author": "Pushkin"})
    );
}

// -------------------------
// Scenario B: two steps with a dependency
// -------------------------

#[tokio::test]
async fn scenario_b_dependency_order_and_step_outputs() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "Find books by Pushkin", "depends_on": []},
                {"id": "q2", "text": "Name the last one", "depends_on": ["q1"]}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![
                decision_result(json!({"author": "Pushkin"}), 0.9, false, false),
                decision_result(json!({"author": "Pushkin", "sort": "year_desc", "limit": 1}), 0.85, false, false),
            ],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(
            names::SYNTHESIZER_AGENT,
            vec![synthesis_result("The last book is Ruslan and Ludmila.")],
        ),
        ScriptedAgent::new(
            "BooksLibraryAgent",
            vec![
                books_result(&["Eugene Onegin", "Ruslan and Ludmila"]),
                books_result(&["Ruslan and Ludmila"]),
            ],
        ),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine
        .invoke(ExecutionContext::new(
            "Find books by Pushkin and name the last one",
        ))
        .await;

    let answer = ctx.get_final_answer().unwrap().as_str().unwrap();
    assert!(answer.contains("Ruslan and Ludmila"));

    // q1's fetch happened strictly before q2's.
    let calls = agent_call_events(&ctx);
    let steps: Vec<&str> = ctx
        .history_events("agent_call")
        .iter()
        .filter_map(|e| e["step"].as_str())
        .collect();
    assert_eq!(steps, vec!["q1", "q2"]);
    assert_eq!(calls.len(), 3); // two fetches + synthesize

    // The reasoner for q2 saw q1's output under its id.
    let reasoner_calls = f.reasoner.calls();
    assert_eq!(reasoner_calls.len(), 2);
    let q2_outputs = &reasoner_calls[1].1["step_outputs"];
    assert_eq!(
        q2_outputs["q1"],
        json!([{"title": "Eugene Onegin"}, {"title": "Ruslan and Ludmila"}])
    );

    assert!(ctx.step("q1").unwrap().completed);
    assert!(ctx.step("q2").unwrap().completed);
}

// -------------------------
// Scenario C: retry then success
// -------------------------

#[tokio::test]
async fn scenario_c_retry_then_success() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "List the books written by Pushkin", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![
                decision_result(json!({"author": "Pushkn"}), 0.8, false, true),
                decision_result(json!({"author": "Pushkin"}), 0.9, false, true),
            ],
        ),
        ScriptedAgent::new(
            names::RESULT_VALIDATOR_AGENT,
            vec![verdict_result(false, 0.9), verdict_result(true, 0.95)],
        ),
        ScriptedAgent::new(
            names::SYNTHESIZER_AGENT,
            vec![synthesis_result("Pushkin wrote Eugene Onegin.")],
        ),
        ScriptedAgent::new(
            "BooksLibraryAgent",
            vec![books_result(&[]), books_result(&["Eugene Onegin"])],
        ),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine
        .invoke(ExecutionContext::new("List the books written by Pushkin"))
        .await;

    let step = ctx.step("q1").unwrap();
    assert!(step.completed);
    assert!(step.error.is_none());
    assert_eq!(step.retry_count, 1);
    assert_eq!(step.raw_output, Some(json!([{"title": "Eugene Onegin"}])));

    // Two fetch attempts in the history.
    let fetches: Vec<_> = agent_call_events(&ctx)
        .into_iter()
        .filter(|(_, op)| op == "list_books")
        .collect();
    assert_eq!(fetches.len(), 2);
    assert_eq!(ctx.history_events("retry").len(), 1);

    // The retry consulted the reasoner again with the corrected params.
    assert_eq!(f.library.calls()[1].1, json!({"author": "Pushkin"}));
    assert!(ctx.get_final_answer().is_some());
}

// -------------------------
// Scenario D: retry exhaustion
// -------------------------

#[tokio::test]
async fn scenario_d_retry_exhaustion_force_completes() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "List the books written by Pushkin", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::repeating(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Nobody"}), 0.8, false, true)],
        ),
        ScriptedAgent::repeating(names::RESULT_VALIDATOR_AGENT, vec![verdict_result(false, 0.9)]),
        ScriptedAgent::new(
            names::SYNTHESIZER_AGENT,
            vec![synthesis_result("No books could be confirmed.")],
        ),
        ScriptedAgent::repeating("BooksLibraryAgent", vec![books_result(&[])]),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine
        .invoke(ExecutionContext::new("List the books written by Pushkin"))
        .await;

    let step = ctx.step("q1").unwrap();
    assert!(step.completed, "step must be force-completed");
    assert_eq!(step.retry_count, 2, "default MAX_RETRIES is 2");
    // Best-effort output survives the exhaustion.
    assert_eq!(step.raw_output, Some(json!([])));
    assert_eq!(ctx.history_events("retry").len(), 2);
    assert_eq!(ctx.history_events("retry_exhausted").len(), 1);

    // The invocation still ends with an answer.
    assert!(ctx.get_final_answer().is_some());
}

// -------------------------
// Scenario E: no viable hypothesis
// -------------------------

#[tokio::test]
async fn scenario_e_no_viable_hypothesis() {
    let low = |conf: f64| {
        json!({
            "agent": "BooksLibraryAgent",
            "operation": "list_books",
            "params": {"author": "Pushkin"},
            "confidence": conf,
        })
    };
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "Unanswerable aside", "depends_on": []},
                {"id": "q2", "text": "List the books written by Pushkin", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![
                decision_result_multi(vec![low(0.3), low(0.3), low(0.3)], false, false),
                decision_result(json!({"author": "Pushkin"}), 0.9, false, false),
            ],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(
            names::SYNTHESIZER_AGENT,
            vec![synthesis_result("Pushkin wrote Eugene Onegin.")],
        ),
        ScriptedAgent::new("BooksLibraryAgent", vec![books_result(&["Eugene Onegin"])]),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("question")).await;

    let q1 = ctx.step("q1").unwrap();
    assert!(q1.completed);
    assert!(q1.raw_output.is_none(), "null output for the dead-end step");
    assert!(q1.error.is_none());
    assert!(q1.hypothesis.is_none());
    assert_eq!(ctx.history_events("no_viable_hypothesis").len(), 1);

    // The other step still ran and fed the synthesizer.
    assert_eq!(
        ctx.step("q2").unwrap().raw_output,
        Some(json!([{"title": "Eugene Onegin"}]))
    );
    assert!(ctx.get_final_answer().unwrap().as_str().unwrap().contains("Eugene Onegin"));
}

// -------------------------
// Scenario F: planner fallback
// -------------------------

#[tokio::test]
async fn scenario_f_planner_fallback() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![AgentResult::error("model unreachable", stage::PLANNING)],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Pushkin"}), 0.9, false, false)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(
            names::SYNTHESIZER_AGENT,
            vec![synthesis_result("Pushkin wrote Eugene Onegin.")],
        ),
        ScriptedAgent::new("BooksLibraryAgent", vec![books_result(&["Eugene Onegin"])]),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let question = "List the books written by Pushkin";
    let ctx = engine.invoke(ExecutionContext::new(question)).await;

    assert_eq!(ctx.history_events("plan_fallback").len(), 1);
    let plan = ctx.get_plan().unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.subquestions[0].id, "q1");
    assert_eq!(plan.subquestions[0].text, question);
    assert!(ctx.get_final_answer().is_some());
}

#[tokio::test]
async fn structurally_invalid_plan_also_falls_back() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            // Cycle: q1 <-> q2.
            vec![plan_result(json!([
                {"id": "q1", "text": "a", "depends_on": ["q2"]},
                {"id": "q2", "text": "b", "depends_on": ["q1"]}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Pushkin"}), 0.9, false, false)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![synthesis_result("ok")]),
        ScriptedAgent::new("BooksLibraryAgent", vec![books_result(&["Eugene Onegin"])]),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("q")).await;
    assert_eq!(ctx.history_events("plan_fallback").len(), 1);
    assert_eq!(ctx.get_plan().unwrap().len(), 1);
}

// -------------------------
// Failure containment
// -------------------------

#[tokio::test]
async fn malformed_reasoner_decision_fails_step_without_retry() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "q", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![AgentResult::ok(stage::REASONING, json!({"not": "a decision"}))],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![]),
        ScriptedAgent::new("BooksLibraryAgent", vec![]),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("q")).await;

    let step = ctx.step("q1").unwrap();
    assert!(step.completed);
    assert!(step.error.as_deref().unwrap().contains("reasoner"));
    assert_eq!(step.retry_count, 0);
    // All steps failed: canonical failure answer plus reasons.
    assert_eq!(ctx.get_final_answer(), Some(&json!(NO_ANSWER)));
    assert!(ctx.memory_get("failure_reasons").unwrap()["q1"].is_string());
}

#[tokio::test]
async fn tool_error_fails_step_but_invocation_continues() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "broken", "depends_on": []},
                {"id": "q2", "text": "works", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![
                decision_result(json!({"author": "A"}), 0.9, false, false),
                decision_result(json!({"author": "B"}), 0.9, false, false),
            ],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![synthesis_result("partial")]),
        ScriptedAgent::new(
            "BooksLibraryAgent",
            vec![
                AgentResult::error("db timeout", stage::DATA_FETCH),
                books_result(&["Eugene Onegin"]),
            ],
        ),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("q")).await;

    assert_eq!(ctx.step("q1").unwrap().error.as_deref(), Some("db timeout"));
    assert!(ctx.step("q2").unwrap().error.is_none());
    assert_eq!(ctx.get_final_answer(), Some(&json!("partial")));
}

#[tokio::test]
async fn missing_required_param_blocks_tool_and_fails_step() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "q", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            // Hypothesis misses the required `author` param.
            vec![decision_result(json!({}), 0.9, false, false)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![]),
        ScriptedAgent::new("BooksLibraryAgent", vec![books_result(&["never reached"])]),
    );

    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("q")).await;

    let step = ctx.step("q1").unwrap();
    assert!(step.error.as_deref().unwrap().contains("author"));
    // The scripted tool was never invoked.
    assert!(f.library.calls().is_empty());
}

// -------------------------
// Cancellation, deadline, loop budget
// -------------------------

#[tokio::test]
async fn pre_cancelled_invocation_returns_immediately() {
    let f = fixture(
        ScriptedAgent::new(names::PLANNER_AGENT, vec![]),
        ScriptedAgent::new(names::REASONER_AGENT, vec![]),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![]),
        ScriptedAgent::new("BooksLibraryAgent", vec![]),
    );
    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let token = CancelToken::new();
    token.cancel();
    let ctx = engine
        .invoke_cancellable(ExecutionContext::new("q"), token)
        .await;

    assert_eq!(ctx.history_events("cancelled").len(), 1);
    assert!(ctx.get_final_answer().is_none());
    assert!(f.planner.calls().is_empty());
}

#[tokio::test]
async fn zero_deadline_cancels_before_any_node() {
    let f = fixture(
        ScriptedAgent::new(names::PLANNER_AGENT, vec![]),
        ScriptedAgent::new(names::REASONER_AGENT, vec![]),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![]),
        ScriptedAgent::new("BooksLibraryAgent", vec![]),
    );
    let engine = Engine::new(
        f.registry.clone(),
        EngineConfig::default().with_deadline(Duration::from_secs(0)),
    );
    let ctx = engine.invoke(ExecutionContext::new("q")).await;
    assert_eq!(ctx.history_events("cancelled").len(), 1);
}

#[tokio::test]
async fn loop_budget_exhaustion_fails_the_step() {
    // Endless invalid-validation churn, with a retry budget big enough to
    // outlast the loop bound.
    let mut registry = AgentRegistry::new();
    let planner = ScriptedAgent::new(
        names::PLANNER_AGENT,
        vec![plan_result(json!([
            {"id": "q1", "text": "q", "depends_on": []}
        ]))],
    );
    let reasoner = ScriptedAgent::repeating(
        names::REASONER_AGENT,
        vec![decision_result(json!({"author": "X"}), 0.9, false, true)],
    );
    let validator =
        ScriptedAgent::repeating(names::RESULT_VALIDATOR_AGENT, vec![verdict_result(false, 0.9)]);
    let synthesizer = ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![]);
    let library = ScriptedAgent::repeating("BooksLibraryAgent", vec![books_result(&[])]);

    registry.register_control(registration(names::PLANNER_AGENT, planner_ops(), planner));
    let mut reasoner_reg = registration(names::REASONER_AGENT, reasoner_ops(), reasoner);
    reasoner_reg.descriptor.config = json!({"max_retries": 1000});
    registry.register_control(reasoner_reg);
    registry.register_control(registration(
        names::RESULT_VALIDATOR_AGENT,
        validator_ops(),
        validator,
    ));
    registry.register_control(registration(
        names::SYNTHESIZER_AGENT,
        synthesizer_ops(),
        synthesizer,
    ));
    registry.register_tool(registration("BooksLibraryAgent", library_ops(), library));

    let engine = Engine::new(
        Arc::new(registry),
        EngineConfig::default().with_step_loop_budget(5),
    );
    let ctx = engine.invoke(ExecutionContext::new("q")).await;

    let step = ctx.step("q1").unwrap();
    assert!(step.completed);
    assert_eq!(step.error.as_deref(), Some("loop_budget_exhausted"));
    assert_eq!(ctx.history_events("loop_budget_exhausted").len(), 1);
}

// -------------------------
// Quantified invariants
// -------------------------

#[tokio::test]
async fn invariant_completed_stages_were_expected_and_timestamps_grow() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "q", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Pushkin"}), 0.9, false, true)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![verdict_result(true, 0.9)]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![synthesis_result("done")]),
        ScriptedAgent::new("BooksLibraryAgent", vec![books_result(&["Eugene Onegin"])]),
    );
    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("q")).await;

    for (_, step) in ctx.steps() {
        // Property 1: completed implies expected, stage by stage.
        for stage in subquest_core::Stage::ORDER {
            if step.completed_stages.get(stage) {
                assert!(step.expected.get(stage));
            }
        }
        // Property 2: completed means failed or all expected stages done.
        if step.completed {
            assert!(step.error.is_some() || step.all_expected_completed());
        }
        // Property 6: retry bound.
        assert!(step.retry_count <= 2);
        // Property 5: agent_calls timestamps are monotonically growing.
        let timestamps: Vec<DateTime<Utc>> = step
            .agent_calls
            .iter()
            .filter_map(|call| call["ts"].as_str())
            .filter_map(|ts| ts.parse().ok())
            .collect();
        assert_eq!(timestamps.len(), step.agent_calls.len());
        for pair in timestamps.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }
}

#[tokio::test]
async fn invariant_context_round_trips_after_full_run() {
    let f = fixture(
        ScriptedAgent::new(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "q", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::new(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Pushkin"}), 0.9, false, true)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![verdict_result(true, 0.9)]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![synthesis_result("done")]),
        ScriptedAgent::new("BooksLibraryAgent", vec![books_result(&["Eugene Onegin"])]),
    );
    let engine = Engine::new(f.registry.clone(), EngineConfig::default());
    let ctx = engine.invoke(ExecutionContext::new("q")).await;

    // Property 7: serialize/deserialize yields an equal context.
    let serialized = serde_json::to_string(&ctx).unwrap();
    let back: ExecutionContext = serde_json::from_str(&serialized).unwrap();
    assert_eq!(back, ctx);
}

#[tokio::test]
async fn concurrent_invocations_share_one_registry() {
    // Two invocations, one engine, one registry, one set of cached agent
    // instances; each invocation owns its own context.
    let f = fixture(
        ScriptedAgent::repeating(
            names::PLANNER_AGENT,
            vec![plan_result(json!([
                {"id": "q1", "text": "q", "depends_on": []}
            ]))],
        ),
        ScriptedAgent::repeating(
            names::REASONER_AGENT,
            vec![decision_result(json!({"author": "Pushkin"}), 0.9, false, false)],
        ),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::repeating(names::SYNTHESIZER_AGENT, vec![synthesis_result("done")]),
        ScriptedAgent::repeating("BooksLibraryAgent", vec![books_result(&["Eugene Onegin"])]),
    );
    let engine = Arc::new(Engine::new(f.registry.clone(), EngineConfig::default()));

    let (a, b) = tokio::join!(
        engine.invoke(ExecutionContext::new("first question")),
        engine.invoke(ExecutionContext::new("second question")),
    );

    for ctx in [&a, &b] {
        assert!(ctx.step("q1").unwrap().completed);
        assert_eq!(ctx.get_final_answer(), Some(&json!("done")));
    }
    assert_eq!(a.get_question(), "first question");
    assert_eq!(b.get_question(), "second question");
}

#[tokio::test]
async fn control_agents_are_not_dispatchable_as_tools() {
    let f = fixture(
        ScriptedAgent::new(names::PLANNER_AGENT, vec![]),
        ScriptedAgent::new(names::REASONER_AGENT, vec![]),
        ScriptedAgent::new(names::RESULT_VALIDATOR_AGENT, vec![]),
        ScriptedAgent::new(names::SYNTHESIZER_AGENT, vec![]),
        ScriptedAgent::new("BooksLibraryAgent", vec![]),
    );
    let ctx = ExecutionContext::new("q");
    let result = f
        .registry
        .dispatch(
            Namespace::Tools,
            names::SYNTHESIZER_AGENT,
            names::OP_SYNTHESIZE,
            json!({}),
            &ctx,
        )
        .await;
    assert!(result.is_error());

    // And the tool snapshot never mentions them.
    let snapshot = f.registry.snapshot();
    assert!(snapshot.get(names::SYNTHESIZER_AGENT).is_none());
    assert!(snapshot.get("BooksLibraryAgent").is_some());
}
