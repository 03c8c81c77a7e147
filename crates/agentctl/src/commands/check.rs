//! `agentctl check` - one probe of the working copy.

use std::path::PathBuf;

use agentctl_core::{AgentId, Config, StatusProbe};
use anyhow::Result;

use crate::workdir::WorkdirProbe;

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub workdir: PathBuf,
}

pub async fn run(options: &CheckOptions, config: &Config) -> Result<()> {
    let probe = WorkdirProbe::new(config, &options.workdir);
    let agent = AgentId::parse("check")?;
    let report = probe.probe(&agent).await?;

    println!("Tests: {}", report.test_status);
    println!("Uncommitted changes: {}", report.has_uncommitted_changes);
    println!("Agent running: {}", report.executor_running);
    if report.is_complete() {
        println!("✓ Task appears complete");
    } else {
        println!("Pending work remains");
    }
    Ok(())
}
