//! Command-line interface for prsentry.
//!
//! Provides commands for running the review pipeline, inspecting stored
//! state for a PR, and setting a manual halt.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{ChatCompletionsClient, GitHubClient};
use crate::config::Config;
use crate::core::{PipelineEngine, ReviewStore};
use crate::domain::PipelineStatus;

/// prsentry - Human-in-the-loop PR review pipeline orchestrator
#[derive(Parser, Debug)]
#[command(name = "prsentry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the nine-step review pipeline for a PR
    Run {
        /// PR number to review
        #[arg(long)]
        pr_number: u64,
    },

    /// Show stored outputs, approvals, and halt state for a PR
    Status {
        /// PR number to inspect
        #[arg(long)]
        pr_number: u64,
    },

    /// Veto a PR's pipeline until the halt is cleared by hand
    Halt {
        /// PR number to halt
        #[arg(long)]
        pr_number: u64,

        /// Why the run is being vetoed
        #[arg(long, default_value = "halted manually")]
        reason: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { pr_number } => run_pipeline(pr_number).await,
            Commands::Status { pr_number } => show_status(pr_number),
            Commands::Halt { pr_number, reason } => halt_run(pr_number, &reason),
        }
    }
}

/// Run the pipeline and exit with a status-distinguishing code:
/// 0 completed, 1 halted, 2 failed.
async fn run_pipeline(pr_number: u64) -> Result<()> {
    let config = Config::load()?;
    let store = Arc::new(
        ReviewStore::open(&config.store_path)
            .with_context(|| format!("Failed to open store at {}", config.store_path.display()))?,
    );
    let code_host = Arc::new(GitHubClient::from_config(&config.github)?);
    let llm = Arc::new(ChatCompletionsClient::from_config(&config.llm)?);

    let engine = PipelineEngine::new(store, code_host, llm, config.approval.clone());
    let outcome = engine.run(pr_number).await?;

    match outcome.status {
        PipelineStatus::Completed => {
            println!("PR #{}: review pipeline completed", pr_number);
        }
        PipelineStatus::Halted => {
            let detail = outcome
                .halted_at
                .as_ref()
                .map(|h| format!(" at '{}' ({})", h.step_name, h.reason))
                .unwrap_or_default();
            println!("PR #{}: pipeline halted{}", pr_number, detail);
        }
        PipelineStatus::Failed => {
            println!(
                "PR #{}: pipeline failed: {}",
                pr_number,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    std::process::exit(outcome.exit_code());
}

fn show_status(pr_number: u64) -> Result<()> {
    let config = Config::load()?;
    let store = ReviewStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store at {}", config.store_path.display()))?;

    match store.halt_record(pr_number)? {
        Some(halt) => println!(
            "Halted at '{}' since {}: {}",
            halt.step_name, halt.created_at, halt.reason
        ),
        None => println!("Not halted"),
    }

    for approval_step in [3u8, 8u8] {
        match store.read_approval(pr_number, approval_step)? {
            Some(record) => println!(
                "Approval step {}: {} by {} at {}",
                approval_step,
                if record.approved { "approved" } else { "rejected" },
                record.decider,
                record.created_at
            ),
            None => println!("Approval step {}: pending", approval_step),
        }
    }

    let outputs = store.all_outputs(pr_number)?;
    if outputs.is_empty() {
        println!("No step outputs stored");
    } else {
        println!("Step outputs ({}):", outputs.len());
        for (step_name, payload) in outputs {
            println!("  {} ({} bytes)", step_name, payload.to_string().len());
        }
    }

    Ok(())
}

fn halt_run(pr_number: u64, reason: &str) -> Result<()> {
    let config = Config::load()?;
    let store = ReviewStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store at {}", config.store_path.display()))?;

    store.set_halted(pr_number, "manual", reason)?;
    println!("PR #{} halted: {}", pr_number, reason);
    Ok(())
}
