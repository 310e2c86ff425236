//! subquest command-line interface.
//!
//! `subquest ask "<question>"` runs the full graph against the configured
//! LLM backend and the sample library; `subquest tools` prints the
//! sanitized tool snapshot the planner and reasoner see.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::CliConfig;
use llm::ProfileRegistry;
use subquest_agents::catalog::default_registry;
use subquest_agents::library::store::InMemoryBookStore;
use subquest_core::{Engine, ExecutionContext, Plan};

#[derive(Parser)]
#[command(name = "subquest", version, about = "Multi-agent question answering")]
struct Cli {
    /// Path to a YAML config file.
    #[arg(long, global = true, env = "SUBQUEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question.
    Ask {
        /// The question to answer.
        question: String,

        /// Print the full history trail after the answer.
        #[arg(long)]
        show_history: bool,
    },
    /// Print the sanitized tool-registry snapshot.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    let profiles = Arc::new(ProfileRegistry::new());
    for profile in &config.llm.profiles {
        profiles.register_profile(profile.clone());
    }
    let registry = Arc::new(default_registry(
        profiles,
        Arc::new(InMemoryBookStore::sample_library()),
        &config.llm.default_profile,
    ));

    match cli.command {
        Command::Ask {
            question,
            show_history,
        } => {
            let engine = Engine::new(registry, config.engine_config());
            let ctx = engine.invoke(ExecutionContext::new(question)).await;

            if let Some(plan) = ctx.get_plan() {
                if let Some(dir) = &config.archive_dir {
                    archive_plan(dir, plan);
                }
            }

            match ctx.get_final_answer() {
                Some(serde_json::Value::String(answer)) => println!("{answer}"),
                Some(other) => println!("{other}"),
                None => println!("(no answer produced)"),
            }

            if show_history {
                println!("\n--- history ---");
                for event in ctx.history() {
                    println!("{event}");
                }
            }
        }
        Command::Tools => {
            let snapshot = registry.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

/// Archive one plan as `<plan_id>.json`. Best effort: failures are logged
/// and never abort the invocation's output.
fn archive_plan(dir: &std::path::Path, plan: &Plan) {
    let write = || -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating archive dir {}", dir.display()))?;
        let path = dir.join(format!("{}.json", plan.plan_id));
        let payload = serde_json::to_string_pretty(plan)?;
        std::fs::write(&path, payload)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "plan archived");
        Ok(())
    };
    if let Err(e) = write() {
        warn!(error = %e, "plan archival failed");
    }
}
