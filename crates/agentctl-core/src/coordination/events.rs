//! Append-only coordination event log.
//!
//! Events are immutable once written and carry a timestamp assigned by the
//! log at publish time. Which agents an event concerns is decided by its
//! [`EventKind`]'s [`Audience`]:
//!
//! | kind                              | audience    |
//! |-----------------------------------|-------------|
//! | `pushed`, `merged`                | everyone    |
//! | `rebase_needed`                   | `target` or everyone when untargeted |
//! | `claim`, `release`, `committed`, `pr_created` | author only |
//!
//! Authors always see their own events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::namespace::NamespaceStore;
use crate::{identifiers::AgentId, Error, Result};

/// Data key naming the agent a targeted event is meant for.
pub const TARGET_KEY: &str = "target";

/// Kinds of coordination events.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Claim,
    Release,
    Committed,
    Pushed,
    PrCreated,
    Merged,
    RebaseNeeded,
}

/// Who an event is relevant to besides its author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Only the author.
    Author,
    /// Every agent in the namespace.
    Broadcast,
    /// The agent named in the `target` data key, or everyone if absent.
    Targeted,
}

impl EventKind {
    pub const fn audience(self) -> Audience {
        match self {
            Self::Pushed | Self::Merged => Audience::Broadcast,
            Self::RebaseNeeded => Audience::Targeted,
            Self::Claim | Self::Release | Self::Committed | Self::PrCreated => Audience::Author,
        }
    }

    /// Whether agents may publish this kind directly.
    ///
    /// `claim` and `release` are only emitted by the claim registry.
    pub const fn is_publishable(self) -> bool {
        !matches!(self, Self::Claim | Self::Release)
    }

    /// Parse a wire name such as `pr_created`.
    pub fn parse(s: &str) -> Result<Self> {
        s.trim().parse().map_err(|_| {
            Error::validation(
                "event type",
                format!(
                    "unknown event type '{s}' (expected one of: committed, pushed, pr_created, merged, rebase_needed)"
                ),
            )
        })
    }
}

/// A published coordination event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub agent: AgentId,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl Event {
    /// The agent this event is addressed to, if it names one.
    pub fn target(&self) -> Option<&str> {
        self.data.get(TARGET_KEY).map(String::as_str)
    }

    /// Whether `agent` should see this event.
    pub fn is_relevant_to(&self, agent: &AgentId) -> bool {
        if self.agent == *agent {
            return true;
        }
        match self.kind.audience() {
            Audience::Author => false,
            Audience::Broadcast => true,
            Audience::Targeted => self.addresses(agent),
        }
    }

    /// A `rebase_needed` that applies to `agent`: untargeted or aimed at it.
    pub fn requests_rebase_of(&self, agent: &AgentId) -> bool {
        self.kind == EventKind::RebaseNeeded && self.addresses(agent)
    }

    fn addresses(&self, agent: &AgentId) -> bool {
        self.target().map_or(true, |target| target == agent.as_str())
    }
}

/// An event before publication. It has no timestamp; the log assigns one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    kind: EventKind,
    agent: AgentId,
    data: BTreeMap<String, String>,
}

impl NewEvent {
    pub const fn new(kind: EventKind, agent: AgentId) -> Self {
        Self {
            kind,
            agent,
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Address the event to a single agent.
    #[must_use]
    pub fn targeting(self, agent: &AgentId) -> Self {
        self.with_data(TARGET_KEY, agent.as_str())
    }

    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    fn stamp(self, timestamp: DateTime<Utc>) -> Event {
        Event {
            kind: self.kind,
            agent: self.agent,
            timestamp,
            data: self.data,
        }
    }
}

/// Read and publish operations over one namespace's log.
#[derive(Debug, Clone, Copy)]
pub struct EventLog<'a> {
    store: &'a dyn NamespaceStore,
}

impl<'a> EventLog<'a> {
    pub fn new(store: &'a dyn NamespaceStore) -> Self {
        Self { store }
    }

    /// Append `draft` with the current time as its timestamp.
    pub fn publish(&self, draft: NewEvent) -> Result<Event> {
        let event = draft.stamp(Utc::now());
        self.store.append_event(&event)?;
        tracing::debug!(
            kind = %event.kind,
            agent = %event.agent,
            repo = %self.store.identity(),
            "Published event"
        );
        Ok(event)
    }

    /// Every readable event, in append order.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        self.store.load_events()
    }

    /// Events strictly newer than `since`.
    pub fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|event| event.timestamp > since)
            .collect())
    }

    /// Events relevant to `agent` (see [`Event::is_relevant_to`]).
    pub fn read_for_agent(&self, agent: &AgentId) -> Result<Vec<Event>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|event| event.is_relevant_to(agent))
            .collect())
    }

    /// Whether a rebase applying to `agent` was requested after `since`.
    pub fn has_rebase_needed(&self, agent: &AgentId, since: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .read_all()?
            .iter()
            .any(|event| event.timestamp > since && event.requests_rebase_of(agent)))
    }

    /// The last `count` events, oldest first.
    pub fn tail(&self, count: usize) -> Result<Vec<Event>> {
        let mut events = self.read_all()?;
        let skip = events.len().saturating_sub(count);
        Ok(events.split_off(skip))
    }
}
