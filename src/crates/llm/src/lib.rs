//! LLM client contract and provider adapters for subquest.
//!
//! subquest is an **orchestration engine**, not an LLM client library. The
//! engine and the prebuilt agents only ever talk to the [`LlmClient`] trait;
//! which provider sits behind it is a wiring decision:
//!
//! - [`OpenAiCompatClient`] speaks the OpenAI chat-completions wire format,
//!   which covers OpenAI itself plus the long tail of compatible servers
//!   (vLLM, llama.cpp server, LM Studio, Ollama in compat mode).
//! - [`ScriptedClient`] replays canned responses and is the test double used
//!   throughout the workspace.
//!
//! Handles are created lazily through a [`ProfileRegistry`]: agents name a
//! profile (`llm_profile` in their config) and the registry constructs and
//! caches one shared client per profile.
//!
//! # Example
//!
//! ```rust,no_run
//! use llm::{LlmProfile, LlmRequest, LlmMessage, ProfileRegistry};
//!
//! # async fn run() -> Result<(), llm::LlmError> {
//! let registry = ProfileRegistry::new();
//! registry.register_profile(LlmProfile {
//!     name: "default".to_string(),
//!     base_url: "http://localhost:8000/v1".to_string(),
//!     model: "qwen2.5-7b-instruct".to_string(),
//!     ..LlmProfile::default()
//! });
//!
//! let client = registry.ensure("default")?;
//! let response = client
//!     .generate(LlmRequest::new(vec![LlmMessage::user("What is 2 + 2?")]))
//!     .await?;
//! println!("{}", response.answer);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod openai;
pub mod profile;
pub mod request;
pub mod response;
pub mod retry;
pub mod scripted;

pub use client::LlmClient;
pub use error::{LlmError, Result};
pub use openai::OpenAiCompatClient;
pub use profile::{LlmProfile, ProfileRegistry};
pub use request::{LlmMessage, LlmRequest, Role};
pub use response::LlmResponse;
pub use retry::RetryPolicy;
pub use scripted::ScriptedClient;
