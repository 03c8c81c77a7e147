//! `agentctl state set|remove`

use agentctl_core::{AgentId, AgentStatus, Config, RepoUrl};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct SetStateOptions {
    pub agent: AgentId,
    pub repo_url: RepoUrl,
    pub status: AgentStatus,
    pub branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoveStateOptions {
    pub agent: AgentId,
    pub repo_url: RepoUrl,
}

pub fn run_set(options: &SetStateOptions, config: &Config) -> Result<()> {
    let namespace = super::namespace(config, &options.repo_url)?;
    let state = namespace
        .agents()
        .update(&options.agent, options.status, options.branch.as_deref())?;

    match &state.branch {
        Some(branch) => println!("✓ {} is {} on {branch}", state.name, state.status),
        None => println!("✓ {} is {}", state.name, state.status),
    }
    Ok(())
}

pub fn run_remove(options: &RemoveStateOptions, config: &Config) -> Result<()> {
    let namespace = super::namespace(config, &options.repo_url)?;
    let removed = namespace.agents().remove(&options.agent)?;

    println!("✓ Removed state for {}", removed.name);
    Ok(())
}
