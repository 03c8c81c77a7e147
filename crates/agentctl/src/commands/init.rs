//! `agentctl init`

use agentctl_core::{Config, CoordinationStore, FileStore, RepoUrl};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub repo_url: RepoUrl,
}

/// Explicit initialization. Storage failures surface to the caller.
pub fn run(options: &InitOptions, config: &Config) -> Result<()> {
    let store = FileStore::from_config(config);
    let namespace = store.initialize(&options.repo_url)?;

    println!("✓ Initialized coordination for {}", options.repo_url);
    println!("  {}", store.namespace_dir(namespace.id()).display());
    Ok(())
}
