//! Completion-driven retry loop.
//!
//! [`RetryController::run`] drives one agent's task until the working copy
//! reports passing tests and no uncommitted changes, or until the attempt
//! budget is spent:
//!
//! ```text
//! Working -> CheckingRebase -> Executing -> Evaluating -+-> Done
//!    ^                                                  |
//!    +------------------- backoff ----------------------+-> Blocked (budget spent)
//! ```
//!
//! Coordination is best-effort. If the namespace cannot be initialized the
//! run continues without it, and individual coordination failures are only
//! logged. Executor failures are logged too; only running out of attempts
//! ends the loop with an error.

mod capabilities;
mod prompt;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use capabilities::{ProbeReport, StatusProbe, TaskExecutor, TestStatus};
pub use prompt::{build_prompt, REBASE_NOTE};

use crate::{
    coordination::{AgentStatus, CoordinationStore, Namespace},
    history::{CompletionRecord, HistoryStore, Outcome},
    identifiers::{AgentId, RepoUrl},
    Error, Result,
};

/// Attempts used when a policy asks for zero.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Pause between the executor finishing and the status probe.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Pause between an unfinished attempt and the next one.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(3);

/// Attempt budget and fixed delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub settle_delay: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy with no delays, for tests and dry runs.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            settle_delay: Duration::ZERO,
            backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn effective_max_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            self.max_attempts
        }
    }
}

/// What to run and where to coordinate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub agent: AgentId,
    pub task: String,
    /// Repository whose namespace the agent coordinates through, if any.
    pub repo_url: Option<RepoUrl>,
    pub branch: Option<String>,
}

impl RunRequest {
    pub fn new(agent: AgentId, task: impl Into<String>) -> Self {
        Self {
            agent,
            task: task.into(),
            repo_url: None,
            branch: None,
        }
    }

    #[must_use]
    pub fn with_repo(mut self, repo_url: RepoUrl) -> Self {
        self.repo_url = Some(repo_url);
        self
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub agent: AgentId,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_status: ProbeReport,
    /// Claims released on completion.
    pub released_claims: usize,
}

/// Drives an agent until its task is done or the attempt budget runs out.
pub struct RetryController<E, P> {
    store: Arc<dyn CoordinationStore>,
    executor: E,
    probe: P,
    policy: RetryPolicy,
    history: Option<HistoryStore>,
}

impl<E, P> RetryController<E, P>
where
    E: TaskExecutor,
    P: StatusProbe,
{
    pub fn new(store: Arc<dyn CoordinationStore>, executor: E, probe: P) -> Self {
        Self {
            store,
            executor,
            probe,
            policy: RetryPolicy::default(),
            history: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `request` to completion.
    ///
    /// Returns [`Error::MaxAttemptsExceeded`] when every attempt finished
    /// without passing tests and a clean working copy. Claims are left in
    /// place in that case since the agent may be mid-edit.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let max_attempts = self.policy.effective_max_attempts();
        let started_at = Utc::now();
        let namespace = self.connect(request);
        let mut previous: Option<ProbeReport> = None;

        tracing::info!(
            agent = %request.agent,
            max_attempts,
            coordinated = namespace.is_some(),
            "Starting run"
        );

        for attempt in 1..=max_attempts {
            tracing::info!(agent = %request.agent, attempt, max_attempts, "Attempt started");
            self.publish_status(namespace.as_ref(), request, AgentStatus::Working);

            let rebase_needed = self.rebase_requested(namespace.as_ref(), request, started_at);
            if rebase_needed {
                tracing::info!(agent = %request.agent, attempt, "Rebase requested by another agent");
            }

            let prompt = build_prompt(&request.task, previous.as_ref(), rebase_needed);
            if let Err(e) = self.executor.execute(&request.agent, &prompt).await {
                tracing::warn!(agent = %request.agent, attempt, "Executor failed: {e}");
            }

            sleep(self.policy.settle_delay).await;

            let report = match self.probe.probe(&request.agent).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(agent = %request.agent, attempt, "Status probe failed: {e}");
                    ProbeReport::unknown()
                }
            };
            tracing::info!(
                agent = %request.agent,
                attempt,
                tests = %report.test_status,
                uncommitted = report.has_uncommitted_changes,
                "Attempt evaluated"
            );

            if report.is_complete() {
                return Ok(self
                    .complete(namespace.as_ref(), request, attempt, started_at, report)
                    .await);
            }

            previous = Some(report);
            if attempt < max_attempts {
                sleep(self.policy.backoff).await;
            }
        }

        self.publish_status(namespace.as_ref(), request, AgentStatus::Blocked);
        let last = previous.unwrap_or_default();
        tracing::warn!(agent = %request.agent, attempts = max_attempts, "Run blocked");

        Err(Error::MaxAttemptsExceeded {
            attempts: max_attempts,
            test_status: last.test_status,
            has_uncommitted_changes: last.has_uncommitted_changes,
        })
    }

    /// Initialize the request's namespace, or run uncoordinated.
    fn connect(&self, request: &RunRequest) -> Option<Namespace> {
        let repo_url = request.repo_url.as_ref()?;
        match self.store.initialize(repo_url) {
            Ok(namespace) => Some(namespace),
            Err(e) => {
                tracing::warn!(
                    agent = %request.agent,
                    repo = %repo_url,
                    "Coordination disabled for this run: {e}"
                );
                None
            }
        }
    }

    fn publish_status(
        &self,
        namespace: Option<&Namespace>,
        request: &RunRequest,
        status: AgentStatus,
    ) {
        let Some(namespace) = namespace else {
            return;
        };
        if let Err(e) =
            namespace
                .agents()
                .update(&request.agent, status, request.branch.as_deref())
        {
            tracing::warn!(agent = %request.agent, %status, "Failed to publish agent state: {e}");
        }
    }

    fn rebase_requested(
        &self,
        namespace: Option<&Namespace>,
        request: &RunRequest,
        since: DateTime<Utc>,
    ) -> bool {
        namespace.map_or(false, |namespace| {
            namespace
                .events()
                .has_rebase_needed(&request.agent, since)
                .unwrap_or_else(|e| {
                    tracing::warn!(agent = %request.agent, "Failed to read event log: {e}");
                    false
                })
        })
    }

    async fn complete(
        &self,
        namespace: Option<&Namespace>,
        request: &RunRequest,
        attempts: u32,
        started_at: DateTime<Utc>,
        final_status: ProbeReport,
    ) -> RunReport {
        self.publish_status(namespace, request, AgentStatus::Done);

        let released_claims = namespace.map_or(0, |namespace| {
            namespace
                .claims()
                .release_all(&request.agent)
                .map(|released| released.len())
                .unwrap_or_else(|e| {
                    tracing::warn!(agent = %request.agent, "Failed to release claims: {e}");
                    0
                })
        });

        let finished_at = Utc::now();
        if let Some(history) = &self.history {
            let record = CompletionRecord {
                agent: request.agent.clone(),
                repo_url: request.repo_url.as_ref().map(ToString::to_string),
                outcome: Outcome::Success,
                attempts,
                started_at,
                completed_at: finished_at,
            };
            if let Err(e) = history.save(&record).await {
                tracing::warn!(agent = %request.agent, "Failed to save completion record: {e}");
            }
        }

        tracing::info!(agent = %request.agent, attempts, released_claims, "Run completed");
        RunReport {
            agent: request.agent.clone(),
            attempts,
            started_at,
            finished_at,
            final_status,
            released_claims,
        }
    }
}

async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
