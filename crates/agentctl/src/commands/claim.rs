//! `agentctl claim` / `agentctl release`

use agentctl_core::{AgentId, ClaimOutcome, ClaimPath, Config, ReleaseOutcome, RepoUrl};
use anyhow::Result;
use itertools::Itertools;

#[derive(Debug, Clone)]
pub struct ClaimOptions {
    pub agent: AgentId,
    pub repo_url: RepoUrl,
    pub path: ClaimPath,
}

/// What a release applies to.
#[derive(Debug, Clone)]
pub enum ReleaseTarget {
    Path(ClaimPath),
    All,
}

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub agent: AgentId,
    pub repo_url: RepoUrl,
    pub target: ReleaseTarget,
}

/// Claim a path. A conflict surfaces as an error naming the holder.
pub fn run_claim(options: &ClaimOptions, config: &Config) -> Result<()> {
    let namespace = super::namespace(config, &options.repo_url)?;

    match namespace.claims().claim(&options.agent, &options.path)? {
        ClaimOutcome::Acquired(claim) => {
            println!("✓ Claimed {} for {}", claim.path, claim.agent);
        }
        ClaimOutcome::AlreadyHeld(claim) => {
            println!(
                "✓ {} already claimed by {} (since {})",
                claim.path,
                claim.agent,
                claim.claimed_at.to_rfc3339()
            );
        }
    }
    Ok(())
}

pub fn run_release(options: &ReleaseOptions, config: &Config) -> Result<()> {
    let namespace = super::namespace(config, &options.repo_url)?;

    match &options.target {
        ReleaseTarget::Path(path) => match namespace.claims().release(&options.agent, path)? {
            ReleaseOutcome::Released(claim) => {
                println!("✓ Released {} from {}", claim.path, claim.agent);
            }
            ReleaseOutcome::NotClaimed => println!("{path} is not claimed"),
        },
        ReleaseTarget::All => {
            let released = namespace.claims().release_all(&options.agent)?;
            if released.is_empty() {
                println!("{} holds no claims", options.agent);
            } else {
                println!(
                    "✓ Released {} claim(s) from {}: {}",
                    released.len(),
                    options.agent,
                    released.iter().map(|claim| &claim.path).join(", ")
                );
            }
        }
    }
    Ok(())
}
