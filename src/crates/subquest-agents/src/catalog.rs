//! Default registry assembly.
//!
//! Pairs every prebuilt agent with its descriptor and operation specs and
//! registers it into the right namespace. Embedders with their own agents
//! can start from [`default_registry`] and add registrations on top before
//! handing the registry to the engine.

use llm::ProfileRegistry;
use serde_json::json;
use std::sync::Arc;

use subquest_core::names::{self, stage};
use subquest_core::registry::{
    AgentDescriptor, AgentRegistration, AgentRegistry, OperationSpec, ParamSpec,
};
use subquest_core::{Agent, OperationKind};

use crate::analysis::DataAnalysisAgent;
use crate::library::store::BookStore;
use crate::library::{BooksLibraryAgent, DEFAULT_MAX_ROWS};
use crate::planner::PlannerAgent;
use crate::reasoner::ReasonerAgent;
use crate::relay::StepResultRelayAgent;
use crate::synthesizer::SynthesizerAgent;
use crate::validator::ResultValidatorAgent;

/// Build the standard registry: the books library as a tool, the full
/// control set behind it.
///
/// `llm_profile` names the profile every LLM-consulting agent resolves
/// through `profiles`.
pub fn default_registry(
    profiles: Arc<ProfileRegistry>,
    store: Arc<dyn BookStore>,
    llm_profile: &str,
) -> AgentRegistry {
    let mut registry = AgentRegistry::new();

    register_books_library(&mut registry, store);
    register_planner(&mut registry, profiles.clone(), llm_profile);
    register_reasoner(&mut registry, profiles.clone(), llm_profile);
    register_validator(&mut registry, profiles.clone(), llm_profile);
    register_synthesizer(&mut registry, profiles.clone(), llm_profile);
    register_analysis(&mut registry, profiles, llm_profile);
    register_relay(&mut registry);

    registry
}

fn llm_config(llm_profile: &str) -> serde_json::Value {
    json!({"llm_profile": llm_profile})
}

fn register_books_library(registry: &mut AgentRegistry, store: Arc<dyn BookStore>) {
    let descriptor = AgentDescriptor::new(
        "BooksLibraryAgent",
        "Books and authors catalog",
        "Read-only access to the library catalog: books, authors, chapters. \
         Operations take explicit parameters; the agent never generates queries \
         on its own.",
        "subquest_agents::library::BooksLibraryAgent",
    )
    .with_config(json!({
        "max_rows": DEFAULT_MAX_ROWS,
        "allowed_tables": ["authors", "books", "chapters"],
    }));

    let operations = vec![
        OperationSpec::new(
            "list_books",
            OperationKind::Direct,
            stage::DATA_FETCH,
            "List all books by an author, ordered by publication year.",
        )
        .with_params(vec![
            ParamSpec::required("author", "string").describe("author name, fuzzy-matched")
        ])
        .with_outputs(json!({"type": "array", "items": {"title": "string", "year": "integer"}})),
        OperationSpec::new(
            "get_last_book",
            OperationKind::Direct,
            stage::DATA_FETCH,
            "The author's most recently published book.",
        )
        .with_params(vec![ParamSpec::required("author", "string")])
        .with_outputs(json!({"title": "string", "year": "integer"})),
        OperationSpec::new(
            "get_book_chapters",
            OperationKind::Direct,
            stage::DATA_FETCH,
            "Chapter titles of a book, by exact title.",
        )
        .with_params(vec![ParamSpec::required("title", "string")])
        .with_outputs(json!({"type": "array", "items": "string"})),
        OperationSpec::new(
            "dynamic_query",
            OperationKind::Direct,
            stage::DATA_FETCH,
            "Query a whitelisted table with equality filters and a row limit.",
        )
        .with_params(vec![
            ParamSpec::required("table", "string")
                .describe("one of the allowed tables: authors, books, chapters"),
            ParamSpec::optional("filters", "object").describe("field -> expected value"),
            ParamSpec::optional("limit", "integer"),
        ])
        .with_outputs(json!({"type": "array", "items": "object"})),
        OperationSpec::new(
            "validate_author",
            OperationKind::Validation,
            stage::ENTITY_VALIDATION,
            "Resolve candidate author spellings to canonical catalog names.",
        )
        .with_params(vec![ParamSpec::required("candidates", "array")])
        .with_outputs(json!({"authors": [{"name": "string", "matched_from": "string"}]})),
    ];

    registry.register_tool(AgentRegistration::new(
        descriptor,
        operations,
        Arc::new(move |descriptor| {
            let max_rows = descriptor
                .config_get("max_rows")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_MAX_ROWS);
            let mut agent = BooksLibraryAgent::new(store.clone(), max_rows);
            if let Some(tables) = descriptor.config_get("allowed_tables").and_then(|v| {
                v.as_array().map(|tables| {
                    tables
                        .iter()
                        .filter_map(|t| t.as_str())
                        .map(String::from)
                        .collect::<Vec<_>>()
                })
            }) {
                agent = agent.with_allowed_tables(tables);
            }
            Ok(Arc::new(agent) as Arc<dyn Agent>)
        }),
    ));
}

fn register_planner(
    registry: &mut AgentRegistry,
    profiles: Arc<ProfileRegistry>,
    llm_profile: &str,
) {
    registry.register_control(AgentRegistration::new(
        AgentDescriptor::new(
            names::PLANNER_AGENT,
            "Question planner",
            "Decomposes the user's question into a DAG of atomic sub-questions.",
            "subquest_agents::planner::PlannerAgent",
        )
        .with_config(llm_config(llm_profile)),
        vec![OperationSpec::new(
            names::OP_PLAN,
            OperationKind::Control,
            stage::PLANNING,
            "Produce the sub-question plan for a question.",
        )
        .with_params(vec![
            ParamSpec::required("question", "string"),
            ParamSpec::required("tool_registry_snapshot", "object"),
        ])
        .with_outputs(json!({"plan": {"subquestions": [{"id": "string", "text": "string", "depends_on": "array"}]}}))],
        constructor_with_profile(profiles, |profiles, profile| {
            Arc::new(PlannerAgent::new(profiles, profile)) as Arc<dyn Agent>
        }),
    ));
}

fn register_reasoner(
    registry: &mut AgentRegistry,
    profiles: Arc<ProfileRegistry>,
    llm_profile: &str,
) {
    registry.register_control(AgentRegistration::new(
        AgentDescriptor::new(
            names::REASONER_AGENT,
            "Step reasoner",
            "Proposes tool-call hypotheses and stage flags for one sub-question.",
            "subquest_agents::reasoner::ReasonerAgent",
        )
        .with_config(llm_config(llm_profile)),
        vec![OperationSpec::new(
            names::OP_DECIDE_NEXT_STAGE,
            OperationKind::Control,
            stage::REASONING,
            "Decide the next stage for the current step.",
        )
        .with_params(vec![
            ParamSpec::required("subquestion", "object"),
            ParamSpec::required("step_state", "object"),
            ParamSpec::optional("step_outputs", "object"),
            ParamSpec::required("tool_registry_snapshot", "object"),
        ])
        .with_outputs(json!({
            "hypotheses": "array",
            "postprocessing": "object",
            "validation": "object",
            "final_decision": "object",
            "reasoning": "array",
        }))],
        constructor_with_profile(profiles, |profiles, profile| {
            Arc::new(ReasonerAgent::new(profiles, profile)) as Arc<dyn Agent>
        }),
    ));
}

fn register_validator(
    registry: &mut AgentRegistry,
    profiles: Arc<ProfileRegistry>,
    llm_profile: &str,
) {
    registry.register_control(AgentRegistration::new(
        AgentDescriptor::new(
            names::RESULT_VALIDATOR_AGENT,
            "Result validator",
            "Checks whether a step's output answers its sub-question.",
            "subquest_agents::validator::ResultValidatorAgent",
        )
        .with_config(llm_config(llm_profile)),
        vec![OperationSpec::new(
            names::OP_VALIDATE_RESULT,
            OperationKind::Validation,
            stage::RESULT_VALIDATION,
            "Validate a step result against its sub-question.",
        )
        .with_params(vec![
            ParamSpec::required("subquestion_text", "string"),
            ParamSpec::optional("raw_output", "any"),
            ParamSpec::optional("agent_calls", "array"),
            ParamSpec::optional("step_state", "object"),
        ])
        .with_outputs(json!({"is_valid": "boolean", "confidence": "number", "reasoning": "string"}))],
        constructor_with_profile(profiles, |profiles, profile| {
            Arc::new(ResultValidatorAgent::new(profiles, profile)) as Arc<dyn Agent>
        }),
    ));
}

fn register_synthesizer(
    registry: &mut AgentRegistry,
    profiles: Arc<ProfileRegistry>,
    llm_profile: &str,
) {
    registry.register_control(AgentRegistration::new(
        AgentDescriptor::new(
            names::SYNTHESIZER_AGENT,
            "Answer synthesizer",
            "Aggregates per-step outputs into the final user-facing answer.",
            "subquest_agents::synthesizer::SynthesizerAgent",
        )
        .with_config(llm_config(llm_profile)),
        vec![OperationSpec::new(
            names::OP_SYNTHESIZE,
            OperationKind::Control,
            stage::SYNTHESIS,
            "Build the final answer from the plan and step outputs.",
        )
        .with_params(vec![
            ParamSpec::required("question", "string"),
            ParamSpec::required("plan", "object"),
            ParamSpec::required("step_outputs", "object"),
        ])
        .with_outputs(json!({"final_answer": "string", "confidence": "number"}))],
        constructor_with_profile(profiles, |profiles, profile| {
            Arc::new(SynthesizerAgent::new(profiles, profile)) as Arc<dyn Agent>
        }),
    ));
}

fn register_analysis(
    registry: &mut AgentRegistry,
    profiles: Arc<ProfileRegistry>,
    llm_profile: &str,
) {
    registry.register_control(AgentRegistration::new(
        AgentDescriptor::new(
            names::DATA_ANALYSIS_AGENT,
            "Data analysis",
            "Reduces raw tool output into what the sub-question asked for.",
            "subquest_agents::analysis::DataAnalysisAgent",
        )
        .with_config(llm_config(llm_profile)),
        vec![OperationSpec::new(
            names::OP_ANALYZE,
            OperationKind::Semantic,
            stage::DATA_PROCESSING,
            "Summarize or aggregate a step's raw output.",
        )
        .with_params(vec![
            ParamSpec::required("subquestion_text", "string"),
            ParamSpec::optional("raw_output", "any"),
        ])
        .with_outputs(json!({"analysis": "any"}))],
        constructor_with_profile(profiles, |profiles, profile| {
            Arc::new(DataAnalysisAgent::new(profiles, profile)) as Arc<dyn Agent>
        }),
    ));
}

fn register_relay(registry: &mut AgentRegistry) {
    registry.register_control(AgentRegistration::new(
        AgentDescriptor::new(
            names::STEP_RESULT_RELAY_AGENT,
            "Step result relay",
            "Passes a step result through unchanged.",
            "subquest_agents::relay::StepResultRelayAgent",
        ),
        vec![OperationSpec::new(
            names::OP_RELAY_STEP_RESULT,
            OperationKind::Control,
            stage::DATA_PROCESSING,
            "Relay a payload unchanged.",
        )
        .with_params(vec![ParamSpec::optional("payload", "any")])],
        Arc::new(|_| Ok(Arc::new(StepResultRelayAgent::new()) as Arc<dyn Agent>)),
    ));
}

/// Build a constructor that resolves `llm_profile` from the descriptor's
/// config, falling back to "default".
fn constructor_with_profile(
    profiles: Arc<ProfileRegistry>,
    build: impl Fn(Arc<ProfileRegistry>, String) -> Arc<dyn Agent> + Send + Sync + 'static,
) -> subquest_core::registry::AgentConstructor {
    Arc::new(move |descriptor: &AgentDescriptor| {
        let profile = descriptor
            .config_get("llm_profile")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string();
        Ok(build(profiles.clone(), profile))
    })
}
