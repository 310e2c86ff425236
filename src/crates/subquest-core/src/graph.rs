//! The graph driver.
//!
//! The runtime composes the nodes as a directed graph with conditional
//! edges:
//!
//! ```text
//! planner -> scheduler
//! scheduler -> reasoner      (a step was selected)
//! scheduler -> synthesizer   (none ready)
//! reasoner -> executor       (current tool call exists, step open)
//! reasoner -> scheduler      (otherwise)
//! executor -> scheduler      (always)
//! synthesizer -> end
//! ```
//!
//! Routing the executor back through the scheduler is what keeps
//! scheduling deterministic: the scheduler re-evaluates, the same step wins
//! while it has pending stages, and an independent ready step takes over
//! the moment the current one completes or fails.
//!
//! One `invoke` runs single-threaded cooperatively: one node at a time,
//! each awaited to completion before the next is routed. Parallelism
//! happens *across* invocations, each owning its own context; the registry
//! and its cached agent instances are the only shared pieces.

use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::names;
use crate::nodes;
use crate::registry::{AgentRegistry, Namespace};

/// Cooperative cancellation signal for one invocation.
///
/// Nodes are never interrupted mid-flight; the driver polls the token at
/// every node boundary and returns the current context with a `cancelled`
/// history event.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Error recorded on a step that exceeded the per-step loop bound.
pub const LOOP_BUDGET_ERROR: &str = "loop_budget_exhausted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Planner,
    Scheduler,
    Reasoner,
    Executor,
    Synthesizer,
}

/// The orchestration engine.
///
/// Holds the immutable agent registry and the engine configuration; one
/// engine serves any number of concurrent invocations.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use subquest_core::{AgentRegistry, Engine, EngineConfig, ExecutionContext};
///
/// # async fn run(registry: Arc<AgentRegistry>) {
/// let engine = Engine::new(registry, EngineConfig::default());
/// let ctx = engine
///     .invoke(ExecutionContext::new("List the books written by Pushkin"))
///     .await;
/// println!("{:?}", ctx.get_final_answer());
/// # }
/// ```
pub struct Engine {
    registry: Arc<AgentRegistry>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(registry: Arc<AgentRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// The registry this engine dispatches through.
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Effective retry budget: the reasoner agent's `max_retries` config
    /// key overrides the engine default.
    fn max_retries(&self) -> u32 {
        self.registry
            .registration(Namespace::Control, names::REASONER_AGENT)
            .and_then(|r| r.descriptor.config_get("max_retries"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(self.config.max_retries)
    }

    /// Execute the whole graph for one context.
    ///
    /// Never fails: whatever happens inside, the context comes back with a
    /// complete history and, on any success at all, a final answer in
    /// memory.
    pub async fn invoke(&self, ctx: ExecutionContext) -> ExecutionContext {
        self.invoke_cancellable(ctx, CancelToken::new()).await
    }

    /// Execute the graph under a cancellation token.
    pub async fn invoke_cancellable(
        &self,
        mut ctx: ExecutionContext,
        cancel: CancelToken,
    ) -> ExecutionContext {
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let max_retries = self.max_retries();
        let mut reasoner_entries: HashMap<String, u32> = HashMap::new();
        let mut node = NodeKind::Planner;

        info!(question = ctx.get_question(), "invocation started");
        loop {
            if cancel.is_cancelled() {
                warn!("invocation cancelled");
                ctx.append_history_event(json!({"kind": "cancelled"}));
                return ctx;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!("invocation deadline exceeded");
                    ctx.append_history_event(json!({
                        "kind": "cancelled",
                        "reason": "deadline",
                    }));
                    return ctx;
                }
            }

            node = match node {
                NodeKind::Planner => {
                    nodes::planner::run(&self.registry, &mut ctx).await;
                    NodeKind::Scheduler
                }
                NodeKind::Scheduler => match nodes::scheduler::run(&mut ctx) {
                    Some(id) => {
                        let entries = reasoner_entries.entry(id.clone()).or_insert(0);
                        *entries += 1;
                        if *entries > self.config.step_loop_budget {
                            warn!(step = %id, "step loop budget exhausted");
                            ctx.mark_step_failed(&id, LOOP_BUDGET_ERROR);
                            ctx.append_history_event(json!({
                                "kind": "loop_budget_exhausted",
                                "step": id,
                            }));
                            NodeKind::Scheduler
                        } else {
                            NodeKind::Reasoner
                        }
                    }
                    None => NodeKind::Synthesizer,
                },
                NodeKind::Reasoner => {
                    nodes::reasoner::run(&self.registry, &mut ctx, max_retries).await;
                    self.route_after_reasoner(&ctx)
                }
                NodeKind::Executor => {
                    nodes::executor::run(&self.registry, &mut ctx).await;
                    NodeKind::Scheduler
                }
                NodeKind::Synthesizer => {
                    nodes::synthesizer::run(&self.registry, &mut ctx).await;
                    info!("invocation finished");
                    return ctx;
                }
            };
        }
    }

    fn route_after_reasoner(&self, ctx: &ExecutionContext) -> NodeKind {
        let Some(id) = ctx.get_current_step_id() else {
            return NodeKind::Scheduler;
        };
        if !ctx.is_step_fully_completed(id) && ctx.get_current_tool_call(id).is_some() {
            NodeKind::Executor
        } else {
            NodeKind::Scheduler
        }
    }
}
