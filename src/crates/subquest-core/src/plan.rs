//! The immutable plan DAG.
//!
//! A [`Plan`] is the planner's decomposition of the user's question into
//! [`SubQuestion`]s. It is created once and never mutated; per-step
//! execution state lives in [`crate::context::step::StepExecutionState`],
//! keyed by sub-question id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// One node of the plan DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    /// Stable identifier, unique within the plan.
    pub id: String,

    /// Natural-language text of the sub-question.
    pub text: String,

    /// Ids of sub-questions that must complete first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl SubQuestion {
    /// Sub-question with no dependencies.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            depends_on: Vec::new(),
        }
    }

    /// Add dependencies.
    pub fn depends_on(mut self, ids: Vec<impl Into<String>>) -> Self {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered, validated list of sub-questions.
///
/// Invariants enforced by [`Plan::validate`]:
/// - ids are unique,
/// - `depends_on` references only ids present in the same plan,
/// - the induced graph is acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier assigned at creation.
    pub plan_id: String,

    /// Sub-questions in plan order. Plan order is the scheduler's
    /// tie-breaker among ready steps.
    pub subquestions: Vec<SubQuestion>,
}

impl Plan {
    /// Create a plan with a fresh id and validate it.
    pub fn new(subquestions: Vec<SubQuestion>) -> Result<Self> {
        let plan = Self {
            plan_id: Uuid::new_v4().to_string(),
            subquestions,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// The trivial single-step plan used when planning fails: one
    /// sub-question whose text is the original question.
    pub fn single_step(question: impl Into<String>) -> Self {
        Self {
            plan_id: Uuid::new_v4().to_string(),
            subquestions: vec![SubQuestion::new("q1", question)],
        }
    }

    /// Parse a planner payload of the shape
    /// `{"plan": {"subquestions": [{id, text, depends_on}]}}` (or the bare
    /// `{"subquestions": [...]}`) into a validated plan.
    pub fn from_planner_output(output: &Value) -> Result<Self> {
        let subquestions = output
            .get("plan")
            .unwrap_or(output)
            .get("subquestions")
            .ok_or_else(|| EngineError::InvalidPlan("missing 'subquestions'".to_string()))?;
        let subquestions: Vec<SubQuestion> = serde_json::from_value(subquestions.clone())
            .map_err(|e| EngineError::InvalidPlan(format!("malformed subquestions: {e}")))?;
        if subquestions.is_empty() {
            return Err(EngineError::InvalidPlan("empty plan".to_string()));
        }
        Self::new(subquestions)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.subquestions.is_empty() {
            return Err(EngineError::InvalidPlan("empty plan".to_string()));
        }

        let mut ids = HashSet::new();
        for sq in &self.subquestions {
            if sq.id.trim().is_empty() {
                return Err(EngineError::InvalidPlan("empty sub-question id".to_string()));
            }
            if !ids.insert(sq.id.as_str()) {
                return Err(EngineError::InvalidPlan(format!(
                    "duplicate sub-question id '{}'",
                    sq.id
                )));
            }
        }

        for sq in &self.subquestions {
            for dep in &sq.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(EngineError::InvalidPlan(format!(
                        "sub-question '{}' depends on unknown id '{}'",
                        sq.id, dep
                    )));
                }
                if dep == &sq.id {
                    return Err(EngineError::InvalidPlan(format!(
                        "sub-question '{}' depends on itself",
                        sq.id
                    )));
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Kahn topological sort over the dependency graph. Succeeds iff the
    /// graph is acyclic.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut indegree: HashMap<&str, usize> = self
            .subquestions
            .iter()
            .map(|sq| (sq.id.as_str(), sq.depends_on.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for sq in &self.subquestions {
            for dep in &sq.depends_on {
                dependents.entry(dep.as_str()).or_default().push(sq.id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .subquestions
            .iter()
            .filter(|sq| sq.depends_on.is_empty())
            .map(|sq| sq.id.as_str())
            .collect();
        let mut order = Vec::with_capacity(self.subquestions.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            for dependent in dependents.get(id).into_iter().flatten() {
                let entry = indegree.get_mut(dependent).expect("known id");
                *entry -= 1;
                if *entry == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != self.subquestions.len() {
            return Err(EngineError::InvalidPlan(
                "dependency graph contains a cycle".to_string(),
            ));
        }
        Ok(order)
    }

    /// Sub-question by id.
    pub fn subquestion(&self, id: &str) -> Option<&SubQuestion> {
        self.subquestions.iter().find(|sq| sq.id == id)
    }

    /// Position of a sub-question in plan order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.subquestions.iter().position(|sq| sq.id == id)
    }

    /// Number of sub-questions.
    pub fn len(&self) -> usize {
        self.subquestions.len()
    }

    /// Whether the plan has no sub-questions.
    pub fn is_empty(&self) -> bool {
        self.subquestions.is_empty()
    }
}
