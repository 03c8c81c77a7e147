//! External capabilities the retry loop drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{identifiers::AgentId, Result};

/// Outcome of the project's test suite as seen by a probe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestStatus {
    Pass,
    Fail,
    #[default]
    Unknown,
}

/// Snapshot of an agent's working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    pub test_status: TestStatus,
    pub has_uncommitted_changes: bool,
    pub executor_running: bool,
}

impl ProbeReport {
    /// Report used when the probe itself failed.
    pub const fn unknown() -> Self {
        Self {
            test_status: TestStatus::Unknown,
            has_uncommitted_changes: false,
            executor_running: false,
        }
    }

    /// Tests pass and nothing is left uncommitted.
    pub const fn is_complete(&self) -> bool {
        matches!(self.test_status, TestStatus::Pass) && !self.has_uncommitted_changes
    }
}

/// Runs one attempt of an agent's task.
///
/// `execute` returns once the underlying agent process has finished; it may
/// take minutes. An `Err` means the run failed, but the working copy may
/// still contain progress worth evaluating.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, agent: &AgentId, prompt: &str) -> Result<()>;
}

/// Inspects an agent's working copy after an attempt.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, agent: &AgentId) -> Result<ProbeReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_requires_pass_and_clean_tree() {
        let mut report = ProbeReport {
            test_status: TestStatus::Pass,
            has_uncommitted_changes: false,
            executor_running: true,
        };
        assert!(report.is_complete());

        report.has_uncommitted_changes = true;
        assert!(!report.is_complete());

        report.has_uncommitted_changes = false;
        report.test_status = TestStatus::Unknown;
        assert!(!report.is_complete());

        assert!(!ProbeReport::unknown().is_complete());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(TestStatus::Pass.to_string(), "pass");
        assert_eq!("fail".parse::<TestStatus>().ok(), Some(TestStatus::Fail));
    }
}
