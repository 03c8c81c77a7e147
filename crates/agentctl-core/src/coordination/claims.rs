//! Exclusive path claims.
//!
//! A claim says "this agent is editing this path". At most one claim exists
//! per path; re-claiming by the holder is a no-op and claiming a path held by
//! someone else is a [`Error::Conflict`] that leaves everything untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    events::{EventKind, EventLog, NewEvent},
    namespace::NamespaceStore,
};
use crate::{
    identifiers::{AgentId, ClaimPath},
    Error, Result,
};

/// Claims keyed by path.
pub type ClaimTable = BTreeMap<ClaimPath, Claim>;

/// An exclusive lock record on one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub agent: AgentId,
    pub path: ClaimPath,
    pub claimed_at: DateTime<Utc>,
}

/// Result of a successful [`ClaimRegistry::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The path was free and now belongs to the caller.
    Acquired(Claim),
    /// The caller already held the path; nothing changed.
    AlreadyHeld(Claim),
}

impl ClaimOutcome {
    pub const fn claim(&self) -> &Claim {
        match self {
            Self::Acquired(claim) | Self::AlreadyHeld(claim) => claim,
        }
    }

    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

/// Result of a successful [`ClaimRegistry::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released(Claim),
    /// Nobody held the path.
    NotClaimed,
}

/// Claim operations over one namespace.
#[derive(Debug, Clone, Copy)]
pub struct ClaimRegistry<'a> {
    store: &'a dyn NamespaceStore,
}

impl<'a> ClaimRegistry<'a> {
    pub fn new(store: &'a dyn NamespaceStore) -> Self {
        Self { store }
    }

    /// Claim `path` for `agent`.
    ///
    /// A new claim also appends a `claim` event carrying the path.
    pub fn claim(&self, agent: &AgentId, path: &ClaimPath) -> Result<ClaimOutcome> {
        let mut outcome = None;

        self.store.update_claims(&mut |table: &mut ClaimTable| {
            match table.get(path) {
                Some(existing) if existing.agent == *agent => {
                    outcome = Some(ClaimOutcome::AlreadyHeld(existing.clone()));
                    Ok(false)
                }
                Some(existing) => Err(Error::Conflict {
                    path: path.to_string(),
                    held_by: existing.agent.to_string(),
                    since: existing.claimed_at,
                }),
                None => {
                    let claim = Claim {
                        agent: agent.clone(),
                        path: path.clone(),
                        claimed_at: Utc::now(),
                    };
                    table.insert(path.clone(), claim.clone());
                    outcome = Some(ClaimOutcome::Acquired(claim));
                    Ok(true)
                }
            }
        })?;

        let outcome =
            outcome.ok_or_else(|| Error::storage("claim table update did not run"))?;

        if outcome.is_new() {
            self.events().publish(
                NewEvent::new(EventKind::Claim, agent.clone()).with_data("path", path.as_str()),
            )?;
            tracing::info!(agent = %agent, path = %path, "Claimed path");
        } else {
            tracing::debug!(agent = %agent, path = %path, "Path already held by caller");
        }

        Ok(outcome)
    }

    /// Release `path` on behalf of `agent`.
    ///
    /// Releasing an unclaimed path succeeds without effect. Releasing a path
    /// held by another agent fails with [`Error::Forbidden`].
    pub fn release(&self, agent: &AgentId, path: &ClaimPath) -> Result<ReleaseOutcome> {
        let mut outcome = None;

        self.store.update_claims(&mut |table: &mut ClaimTable| {
            match table.get(path) {
                None => {
                    outcome = Some(ReleaseOutcome::NotClaimed);
                    Ok(false)
                }
                Some(existing) if existing.agent != *agent => Err(Error::Forbidden {
                    path: path.to_string(),
                    held_by: existing.agent.to_string(),
                    requested_by: agent.to_string(),
                }),
                Some(_) => {
                    outcome = table.remove(path).map(ReleaseOutcome::Released);
                    Ok(true)
                }
            }
        })?;

        let outcome =
            outcome.ok_or_else(|| Error::storage("claim table update did not run"))?;

        if let ReleaseOutcome::Released(_) = outcome {
            self.events().publish(
                NewEvent::new(EventKind::Release, agent.clone())
                    .with_data("path", path.as_str()),
            )?;
            tracing::info!(agent = %agent, path = %path, "Released path");
        }

        Ok(outcome)
    }

    /// Remove every claim held by `agent` in one atomic update.
    ///
    /// No per-path release events are published.
    pub fn release_all(&self, agent: &AgentId) -> Result<Vec<Claim>> {
        let mut released = Vec::new();

        self.store.update_claims(&mut |table: &mut ClaimTable| {
            let held: Vec<ClaimPath> = table
                .values()
                .filter(|claim| claim.agent == *agent)
                .map(|claim| claim.path.clone())
                .collect();
            released = held.iter().filter_map(|path| table.remove(path)).collect();
            Ok(!released.is_empty())
        })?;

        if !released.is_empty() {
            tracing::info!(agent = %agent, count = released.len(), "Released all claims");
        }
        Ok(released)
    }

    /// All claims, ordered by path.
    pub fn list(&self) -> Result<Vec<Claim>> {
        Ok(self.store.load_claims()?.into_values().collect())
    }

    /// Claims held by `agent`, ordered by path.
    pub fn claims_of(&self, agent: &AgentId) -> Result<Vec<Claim>> {
        Ok(self
            .store
            .load_claims()?
            .into_values()
            .filter(|claim| claim.agent == *agent)
            .collect())
    }

    /// The current claim on `path`, if any.
    pub fn holder(&self, path: &ClaimPath) -> Result<Option<Claim>> {
        Ok(self.store.load_claims()?.remove(path))
    }

    pub fn is_claimed(&self, path: &ClaimPath) -> Result<bool> {
        Ok(self.store.load_claims()?.contains_key(path))
    }

    fn events(&self) -> EventLog<'a> {
        EventLog::new(self.store)
    }
}
