//! Prebuilt agents for the subquest engine.
//!
//! Two families, mirroring the registry's namespaces:
//!
//! - **control**: [`planner::PlannerAgent`], [`reasoner::ReasonerAgent`],
//!   [`validator::ResultValidatorAgent`], [`synthesizer::SynthesizerAgent`],
//!   [`analysis::DataAnalysisAgent`], [`relay::StepResultRelayAgent`];
//! - **tools**: [`library::BooksLibraryAgent`] over the
//!   [`library::store::BookStore`] seam.
//!
//! [`catalog::default_registry`] assembles all of them into a ready
//! [`subquest_core::AgentRegistry`].
//!
//! LLM-consulting agents follow one shape: build a prompt, call the client
//! resolved from their `llm_profile`, extract the JSON payload and return
//! it in the envelope together with the prompt/raw-response diagnostics.
//! Anything deterministic (hypothesis selection, stage bookkeeping, retry
//! policy) stays in the engine; these agents never duplicate it.

pub mod analysis;
pub mod catalog;
pub mod library;
pub mod planner;
pub mod reasoner;
pub mod relay;
pub mod synthesizer;
pub mod validator;

use llm::{LlmError, LlmRequest, LlmResponse, ProfileRegistry};
use std::sync::Arc;

/// Resolve the profile and run one generation call.
///
/// Shared by every LLM-consulting agent; the profile registry caches one
/// handle per profile, so this is cheap after the first call.
pub(crate) async fn generate(
    profiles: &Arc<ProfileRegistry>,
    profile: &str,
    request: LlmRequest,
) -> Result<LlmResponse, LlmError> {
    let client = profiles.ensure(profile)?;
    client.generate(request).await
}
