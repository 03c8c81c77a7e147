//! `agentctl history` - an agent's last completion record.

use agentctl_core::{AgentId, Config, HistoryStore};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub agent: AgentId,
}

pub async fn run(options: &HistoryOptions, config: &Config) -> Result<()> {
    let record = HistoryStore::from_config(config).load(&options.agent).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
