//! Agent catalog and dispatch.
//!
//! The registry is split into two namespaces:
//!
//! - **tools**: data-access and domain agents, discoverable by the planner
//!   and reasoner through the sanitized [`AgentRegistry::snapshot`];
//! - **control**: planner, reasoner, synthesizer, validator, relay. These
//!   drive the engine and are never offered as tools.
//!
//! A registration pairs a static [`AgentDescriptor`] and its
//! [`OperationSpec`]s with a constructor closure. Operations are therefore
//! enumerable without instantiating the agent, which plan-time snapshots
//! require. Instances are constructed on first use and cached behind a
//! mutex; registries themselves are immutable after startup, so concurrent
//! invocations share one registry and one instance per agent.
//!
//! Dispatch ([`AgentRegistry::dispatch`]) is the single choke point every
//! call goes through. It checks required parameters against the operation's
//! schema, runs the operation, and stamps `agent`, `operation` and
//! `metadata.elapsed_ms` onto the returned envelope. Missing agents,
//! missing operations and missing required params all come back as
//! [`AgentResult::error`]; dispatch never returns `Err`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

use crate::agent::{Agent, OperationKind};
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::result::AgentResult;

/// Registry namespace an agent lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Tools,
    Control,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Tools => write!(f, "tools"),
            Namespace::Control => write!(f, "control"),
        }
    }
}

/// Static metadata of a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique name within its namespace.
    pub name: String,

    /// Human-readable title for the tool snapshot.
    pub title: String,

    /// Purpose and constraints, shown to the planner and reasoner.
    pub description: String,

    /// Where the implementation lives, informational only
    /// (e.g. `subquest_agents::library::BooksLibraryAgent`).
    pub implementation: String,

    /// Runtime configuration handed to the constructor. Recognized keys
    /// include `llm_profile`, `max_rows` and `max_retries`.
    #[serde(default)]
    pub config: Value,
}

impl AgentDescriptor {
    /// Descriptor with an empty config.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        implementation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            implementation: implementation.into(),
            config: json!({}),
        }
    }

    /// Attach configuration.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Read a config key.
    pub fn config_get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    /// Informal type tag (`string`, `object`, `array`, ...). This is a
    /// documentation schema, not JSON-Schema.
    pub kind: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: false,
            description: None,
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Static description of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,

    pub kind: OperationKind,

    /// Lifecycle stage tag results of this operation carry, see
    /// [`crate::names::stage`].
    pub stage: String,

    pub description: String,

    #[serde(default)]
    pub params: Vec<ParamSpec>,

    /// Expected output shape, free-form documentation.
    #[serde(default)]
    pub outputs: Value,
}

impl OperationSpec {
    pub fn new(
        name: impl Into<String>,
        kind: OperationKind,
        stage: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            stage: stage.into(),
            description: description.into(),
            params: Vec::new(),
            outputs: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn with_outputs(mut self, outputs: Value) -> Self {
        self.outputs = outputs;
        self
    }
}

/// Constructor closure producing an agent instance from its descriptor.
pub type AgentConstructor =
    Arc<dyn Fn(&AgentDescriptor) -> Result<Arc<dyn Agent>> + Send + Sync>;

/// A descriptor, its operations and a way to build the agent.
#[derive(Clone)]
pub struct AgentRegistration {
    pub descriptor: AgentDescriptor,
    pub operations: Vec<OperationSpec>,
    constructor: AgentConstructor,
}

impl fmt::Debug for AgentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistration")
            .field("descriptor", &self.descriptor)
            .field("operations", &self.operations.len())
            .field("constructor", &"<function>")
            .finish()
    }
}

impl AgentRegistration {
    pub fn new(
        descriptor: AgentDescriptor,
        operations: Vec<OperationSpec>,
        constructor: AgentConstructor,
    ) -> Self {
        Self {
            descriptor,
            operations,
            constructor,
        }
    }

    /// Find an operation spec by name.
    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| op.name == name)
    }
}

/// The agent catalog: tool and control namespaces plus the instance cache.
#[derive(Default)]
pub struct AgentRegistry {
    tools: HashMap<String, AgentRegistration>,
    control: HashMap<String, AgentRegistration>,
    instances: Mutex<HashMap<(Namespace, String), Arc<dyn Agent>>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("control", &self.control.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AgentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool agent. Build-time only; registries are immutable
    /// once the engine starts.
    pub fn register_tool(&mut self, registration: AgentRegistration) {
        self.tools
            .insert(registration.descriptor.name.clone(), registration);
    }

    /// Register a control agent.
    pub fn register_control(&mut self, registration: AgentRegistration) {
        self.control
            .insert(registration.descriptor.name.clone(), registration);
    }

    fn namespace(&self, ns: Namespace) -> &HashMap<String, AgentRegistration> {
        match ns {
            Namespace::Tools => &self.tools,
            Namespace::Control => &self.control,
        }
    }

    /// Agent names in a namespace, sorted.
    pub fn list(&self, ns: Namespace) -> Vec<String> {
        let mut names: Vec<String> = self.namespace(ns).keys().cloned().collect();
        names.sort();
        names
    }

    /// Registration lookup.
    pub fn registration(&self, ns: Namespace, name: &str) -> Option<&AgentRegistration> {
        self.namespace(ns).get(name)
    }

    /// Construct or fetch the cached instance of an agent.
    pub fn instantiate(&self, ns: Namespace, name: &str) -> Result<Arc<dyn Agent>> {
        let key = (ns, name.to_string());
        {
            let instances = self.instances.lock().expect("instance lock");
            if let Some(instance) = instances.get(&key) {
                return Ok(Arc::clone(instance));
            }
        }

        let registration =
            self.namespace(ns)
                .get(name)
                .ok_or_else(|| EngineError::UnknownAgent {
                    agent: name.to_string(),
                    namespace: ns.to_string(),
                })?;
        let instance = (registration.constructor)(&registration.descriptor)?;

        let mut instances = self.instances.lock().expect("instance lock");
        // Another invocation may have constructed it meanwhile; keep the
        // first one so all callers share a single instance.
        Ok(Arc::clone(
            instances.entry(key).or_insert(instance),
        ))
    }

    /// Sanitized tool-registry snapshot: the only view of the tool
    /// ecosystem the planner and reasoner ever see. No implementation
    /// paths, no config, no secrets.
    pub fn snapshot(&self) -> Value {
        let mut agents = Map::new();
        for (name, registration) in &self.tools {
            let mut operations = Map::new();
            for op in &registration.operations {
                operations.insert(
                    op.name.clone(),
                    json!({
                        "kind": op.kind,
                        "description": op.description,
                        "params": op.params,
                        "outputs": op.outputs,
                    }),
                );
            }
            agents.insert(
                name.clone(),
                json!({
                    "title": registration.descriptor.title,
                    "description": registration.descriptor.description,
                    "operations": operations,
                }),
            );
        }
        Value::Object(agents)
    }

    /// Dispatch one operation call.
    ///
    /// The returned envelope always carries `agent`, `operation` and
    /// `metadata.elapsed_ms`, whatever the outcome.
    pub async fn dispatch(
        &self,
        ns: Namespace,
        agent_name: &str,
        operation: &str,
        params: Value,
        context: &ExecutionContext,
    ) -> AgentResult {
        let started = Instant::now();

        let result = self
            .dispatch_inner(ns, agent_name, operation, params, context)
            .await;

        let mut result = result;
        result.agent = Some(agent_name.to_string());
        result.operation = Some(operation.to_string());
        result.metadata.insert(
            "elapsed_ms".to_string(),
            json!(started.elapsed().as_millis() as u64),
        );
        result
    }

    async fn dispatch_inner(
        &self,
        ns: Namespace,
        agent_name: &str,
        operation: &str,
        params: Value,
        context: &ExecutionContext,
    ) -> AgentResult {
        let Some(registration) = self.namespace(ns).get(agent_name) else {
            warn!(agent = agent_name, namespace = %ns, "dispatch to unknown agent");
            return AgentResult::error(
                format!("agent '{agent_name}' not found in {ns} registry"),
                "dispatch",
            );
        };

        let Some(spec) = registration.operation(operation) else {
            warn!(agent = agent_name, operation, "dispatch to unknown operation");
            return AgentResult::error(
                format!("operation '{operation}' not found on agent '{agent_name}'"),
                "dispatch",
            );
        };

        // Required-parameter check: the operation must not run at all when
        // a required field is absent.
        for param in spec.params.iter().filter(|p| p.required) {
            let present = params
                .get(&param.name)
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if !present {
                return AgentResult::error(
                    format!(
                        "missing required param '{}' for {agent_name}.{operation}",
                        param.name
                    ),
                    spec.stage.clone(),
                )
                .with_input_params(params);
            }
        }

        let instance = match self.instantiate(ns, agent_name) {
            Ok(instance) => instance,
            Err(e) => {
                return AgentResult::error(e.to_string(), spec.stage.clone())
                    .with_input_params(params);
            }
        };

        debug!(agent = agent_name, operation, "dispatching");
        let mut result = instance
            .execute_operation(operation, params.clone(), context)
            .await;
        if result.input_params.is_none() {
            result.input_params = Some(params);
        }
        result
    }
}
