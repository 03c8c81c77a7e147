//! Shared agent-status table.
//!
//! One record per agent, replaced wholesale on every update. Concurrent
//! updates to the same agent resolve to whichever write lands last.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::namespace::NamespaceStore;
use crate::{identifiers::AgentId, Error, Result};

/// What an agent is currently doing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentStatus {
    Working,
    Idle,
    Done,
    Blocked,
}

impl AgentStatus {
    pub fn parse(s: &str) -> Result<Self> {
        s.trim().to_lowercase().parse().map_err(|_| {
            Error::validation(
                "status",
                format!("unknown status '{s}' (expected one of: working, idle, done, blocked)"),
            )
        })
    }
}

/// Latest reported state of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub name: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub status: AgentStatus,
    pub last_update: DateTime<Utc>,
}

/// Full contents of the state table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub agents: BTreeMap<AgentId, AgentState>,
    /// Time of the most recent update to any agent.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Operations on one namespace's agent-state table.
#[derive(Debug, Clone, Copy)]
pub struct AgentStateTable<'a> {
    store: &'a dyn NamespaceStore,
}

impl<'a> AgentStateTable<'a> {
    pub fn new(store: &'a dyn NamespaceStore) -> Self {
        Self { store }
    }

    /// Replace `agent`'s record and bump the table's `last_updated`.
    pub fn update(
        &self,
        agent: &AgentId,
        status: AgentStatus,
        branch: Option<&str>,
    ) -> Result<AgentState> {
        let mut written = None;

        self.store.update_state(&mut |snapshot: &mut StateSnapshot| {
            let now = Utc::now();
            let record = AgentState {
                name: agent.clone(),
                branch: branch
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(String::from),
                status,
                last_update: now,
            };
            snapshot.agents.insert(agent.clone(), record.clone());
            snapshot.last_updated = Some(now);
            written = Some(record);
            Ok(true)
        })?;

        let record = written.ok_or_else(|| Error::storage("state table update did not run"))?;
        tracing::debug!(agent = %agent, status = %status, "Updated agent state");
        Ok(record)
    }

    /// Delete `agent`'s record.
    pub fn remove(&self, agent: &AgentId) -> Result<AgentState> {
        let mut removed = None;

        self.store.update_state(&mut |snapshot: &mut StateSnapshot| {
            removed = snapshot.agents.remove(agent);
            if removed.is_some() {
                snapshot.last_updated = Some(Utc::now());
            }
            Ok(removed.is_some())
        })?;

        removed.ok_or_else(|| Error::NotFound(format!("agent '{agent}' has no recorded state")))
    }

    pub fn get(&self, agent: &AgentId) -> Result<AgentState> {
        self.store
            .load_state()?
            .agents
            .remove(agent)
            .ok_or_else(|| Error::NotFound(format!("agent '{agent}' has no recorded state")))
    }

    pub fn snapshot(&self) -> Result<StateSnapshot> {
        self.store.load_state()
    }
}
