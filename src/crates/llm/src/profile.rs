//! Named LLM profiles and the shared handle cache.
//!
//! Agents never construct clients themselves; their config names an
//! `llm_profile` and [`ProfileRegistry::ensure`] resolves it to a cached
//! `Arc<dyn LlmClient>`. Construction happens lazily on first use and the
//! cache is safe for concurrent lookups from parallel invocations.

use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::openai::OpenAiCompatClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

fn default_timeout_secs() -> u64 {
    120
}

/// Configuration of one named backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProfile {
    /// Profile name agents refer to via `llm_profile`.
    pub name: String,

    /// API root of an OpenAI-compatible endpoint.
    pub base_url: String,

    /// Model identifier passed through to the backend.
    pub model: String,

    /// Literal API key. Prefer `api_key_env` outside tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_url: "http://localhost:8000/v1".to_string(),
            model: "default".to_string(),
            api_key: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmProfile {
    fn resolve_api_key(&self) -> Result<Option<String>> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        match &self.api_key_env {
            Some(var) => match std::env::var(var) {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(LlmError::MissingApiKey(var.clone())),
            },
            None => Ok(None),
        }
    }
}

/// Registry of profiles with a lazily-populated handle cache.
///
/// Profiles are registered once at startup; handle construction is guarded
/// by a reader-writer lock so concurrent invocations share one client per
/// profile.
#[derive(Default)]
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<String, LlmProfile>>,
    handles: RwLock<HashMap<String, Arc<dyn LlmClient>>>,
}

impl ProfileRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a profile.
    pub fn register_profile(&self, profile: LlmProfile) {
        self.profiles
            .write()
            .expect("profiles lock")
            .insert(profile.name.clone(), profile);
    }

    /// Install a pre-built handle under a profile name.
    ///
    /// This is how tests inject [`crate::ScriptedClient`] and how embedders
    /// plug in custom backends without an `LlmProfile`.
    pub fn register_handle(&self, name: impl Into<String>, handle: Arc<dyn LlmClient>) {
        self.handles
            .write()
            .expect("handles lock")
            .insert(name.into(), handle);
    }

    /// Resolve a profile name to a shared client, constructing it on first
    /// use.
    pub fn ensure(&self, name: &str) -> Result<Arc<dyn LlmClient>> {
        if let Some(handle) = self.handles.read().expect("handles lock").get(name) {
            return Ok(Arc::clone(handle));
        }

        let profile = self
            .profiles
            .read()
            .expect("profiles lock")
            .get(name)
            .cloned()
            .ok_or_else(|| LlmError::UnknownProfile(name.to_string()))?;

        let mut handles = self.handles.write().expect("handles lock");
        // Double-checked: another invocation may have built it meanwhile.
        if let Some(handle) = handles.get(name) {
            return Ok(Arc::clone(handle));
        }

        debug!(profile = %name, model = %profile.model, "constructing llm handle");
        let api_key = profile.resolve_api_key()?;
        let client = OpenAiCompatClient::new(
            profile.base_url.clone(),
            profile.model.clone(),
            api_key,
            Duration::from_secs(profile.timeout_secs),
        )?;
        let handle: Arc<dyn LlmClient> = Arc::new(client);
        handles.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Names of all registered profiles and handles.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .read()
            .expect("profiles lock")
            .keys()
            .chain(self.handles.read().expect("handles lock").keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
