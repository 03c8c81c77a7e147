//! Process-backed executor and working-copy probe.
//!
//! [`ProcessExecutor`] launches the configured coding-agent CLI with the
//! attempt's prompt as its last argument. [`WorkdirProbe`] inspects the
//! working copy afterwards: `git status --porcelain` for uncommitted changes,
//! the project's test command for pass/fail and `pgrep -f` for a still
//! running agent.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use agentctl_core::{
    AgentId, Config, Error, ProbeReport, Result, StatusProbe, TaskExecutor, TestStatus,
};
use async_trait::async_trait;
use tokio::process::Command;

/// Test runners recognised by marker file, first match wins.
const TEST_RUNNERS: &[(&[&str], &str)] = &[
    (&["vendor/bin/pest"], "vendor/bin/pest --no-coverage"),
    (&["package.json"], "npm test"),
    (&["go.mod"], "go test ./..."),
    (&["pytest.ini", "pyproject.toml"], "pytest"),
    (&["Cargo.toml"], "cargo test"),
];

/// Guess the test command from marker files in `dir`.
pub fn detect_test_command(dir: &Path) -> Option<String> {
    TEST_RUNNERS
        .iter()
        .find(|(markers, _)| markers.iter().any(|marker| dir.join(marker).is_file()))
        .map(|(_, command)| (*command).to_string())
}

/// Runs `command args... <prompt>` in the working directory.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(config: &Config, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command: config.agent.command.clone(),
            args: config.agent.args.clone(),
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn execute(&self, agent: &AgentId, prompt: &str) -> Result<()> {
        tracing::debug!(%agent, command = %self.command, "Launching agent");

        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(prompt)
            .current_dir(&self.workdir)
            .env("AGENTCTL_AGENT", agent.as_str())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::storage(format!("Failed to launch {}: {e}", self.command)))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::storage(format!("{} exited with {status}", self.command)))
        }
    }
}

/// Observes a working copy on the local filesystem.
#[derive(Debug, Clone)]
pub struct WorkdirProbe {
    workdir: PathBuf,
    test_command: Option<String>,
    agent_command: String,
}

impl WorkdirProbe {
    /// Probe for `workdir`, using the configured test command or a detected one.
    pub fn new(config: &Config, workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        let test_command = config
            .probe
            .test_command
            .clone()
            .or_else(|| detect_test_command(&workdir));
        Self {
            workdir,
            test_command,
            agent_command: config.agent.command.clone(),
        }
    }

    pub fn test_command(&self) -> Option<&str> {
        self.test_command.as_deref()
    }

    async fn has_uncommitted_changes(&self) -> Result<bool> {
        let output = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::storage(format!("Failed to run git status: {e}")))?;

        if !output.status.success() {
            return Err(Error::storage(format!(
                "git status failed in {}: {}",
                self.workdir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn test_status(&self) -> TestStatus {
        let Some(command) = &self.test_command else {
            return TestStatus::Unknown;
        };

        let status = Command::new("sh")
            .args(["-c", command.as_str()])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => TestStatus::Pass,
            Ok(_) => TestStatus::Fail,
            Err(e) => {
                tracing::warn!(%command, "Failed to run test command: {e}");
                TestStatus::Unknown
            }
        }
    }

    async fn agent_running(&self) -> bool {
        Command::new("pgrep")
            .args(["-f", self.agent_command.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl StatusProbe for WorkdirProbe {
    async fn probe(&self, agent: &AgentId) -> Result<ProbeReport> {
        let has_uncommitted_changes = self.has_uncommitted_changes().await?;
        let test_status = self.test_status().await;
        let executor_running = self.agent_running().await;

        tracing::debug!(%agent, %test_status, has_uncommitted_changes, executor_running, "Probed working copy");
        Ok(ProbeReport {
            test_status,
            has_uncommitted_changes,
            executor_running,
        })
    }
}
