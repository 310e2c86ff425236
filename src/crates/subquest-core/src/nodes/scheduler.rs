//! Scheduler node: pick the next ready sub-question.
//!
//! Selection policy: among sub-questions whose dependencies are all
//! completed and which are not themselves completed, the one with the
//! lowest plan index wins. Deterministic and independent of timing.
//!
//! A step in the middle of its stage loop stays non-completed, so the
//! scheduler keeps re-selecting it until it finishes; a dependency-blocked
//! step is skipped in favor of the next ready one.

use tracing::debug;

use crate::context::ExecutionContext;

/// Select and start the next step. Returns the chosen id, or `None` when
/// no step is ready (the driver then routes to the synthesizer).
pub fn run(ctx: &mut ExecutionContext) -> Option<String> {
    match ctx.select_next_step() {
        Some(id) => {
            debug!(step = %id, "scheduling step");
            ctx.start_step(&id);
            Some(id)
        }
        None => {
            ctx.set_current_step_id(None);
            None
        }
    }
}
