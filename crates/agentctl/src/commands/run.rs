//! `agentctl run` - drive an agent until its task is done.

use std::{path::PathBuf, sync::Arc};

use agentctl_core::{
    AgentId, Config, FileStore, HistoryStore, RepoUrl, RetryController, RunRequest,
};
use anyhow::{Context, Result};

use crate::workdir::{ProcessExecutor, WorkdirProbe};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub agent: AgentId,
    pub task: String,
    pub repo_url: Option<RepoUrl>,
    pub branch: Option<String>,
    /// Overrides `retry.max_attempts` from the config.
    pub attempts: Option<u32>,
    pub workdir: PathBuf,
}

pub async fn run(options: &RunOptions, config: &Config) -> Result<()> {
    which::which(&config.agent.command).with_context(|| {
        format!(
            "Agent command '{}' not found in PATH (set agent.command or AGENTCTL_AGENT_COMMAND)",
            config.agent.command
        )
    })?;

    let policy = options
        .attempts
        .map_or_else(|| config.retry.policy(), |n| config.retry.policy().with_max_attempts(n));

    let controller = RetryController::new(
        Arc::new(FileStore::from_config(config)),
        ProcessExecutor::new(config, &options.workdir),
        WorkdirProbe::new(config, &options.workdir),
    )
    .with_policy(policy)
    .with_history(HistoryStore::from_config(config));

    let request = RunRequest {
        agent: options.agent.clone(),
        task: options.task.clone(),
        repo_url: options.repo_url.clone(),
        branch: options.branch.clone(),
    };

    println!(
        "Running {} until done (max {} attempts)",
        request.agent,
        controller.policy().effective_max_attempts()
    );
    println!("Task: {}", request.task);

    let report = controller.run(&request).await?;

    println!(
        "✓ Completed in {} attempt(s) ({}s)",
        report.attempts,
        (report.finished_at - report.started_at).num_seconds()
    );
    if report.released_claims > 0 {
        println!("  Released {} claim(s)", report.released_claims);
    }
    Ok(())
}
