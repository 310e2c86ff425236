//! CLI configuration file.
//!
//! YAML, all sections optional; a missing file means "local defaults"
//! (an OpenAI-compatible endpoint on localhost, engine defaults, no plan
//! archival).

use anyhow::Context;
use llm::LlmProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub engine: EngineSection,

    /// When set, each plan is archived as `<plan_id>.json` under this
    /// directory.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSection {
    /// Profile name the agents are wired to.
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: Vec<LlmProfile>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: vec![LlmProfile::default()],
        }
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub step_loop_budget: Option<u32>,

    /// Per-invocation deadline in seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl CliConfig {
    /// Load a config file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                let config: CliConfig = serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn engine_config(&self) -> subquest_core::EngineConfig {
        let mut config = subquest_core::EngineConfig::default();
        if let Some(max_retries) = self.engine.max_retries {
            config = config.with_max_retries(max_retries);
        }
        if let Some(budget) = self.engine.step_loop_budget {
            config = config.with_step_loop_budget(budget);
        }
        if let Some(secs) = self.engine.deadline_secs {
            config = config.with_deadline(std::time::Duration::from_secs(secs));
        }
        config
    }
}
