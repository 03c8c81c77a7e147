//! Command implementations.
//!
//! Each command takes already-parsed options plus the loaded [`Config`] and
//! prints its result to stdout.

pub mod bus;
pub mod check;
pub mod claim;
pub mod history;
pub mod init;
pub mod notify;
pub mod run;
pub mod state;

use agentctl_core::{Config, CoordinationStore, FileStore, Namespace, RepoUrl};
use anyhow::{Context, Result};

/// Open the namespace for `repo_url`, creating missing tables.
pub fn namespace(config: &Config, repo_url: &RepoUrl) -> Result<Namespace> {
    FileStore::from_config(config)
        .initialize(repo_url)
        .with_context(|| format!("Failed to open coordination namespace for {repo_url}"))
}
