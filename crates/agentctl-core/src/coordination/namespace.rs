//! Store contracts and the namespace handle.

use std::{fmt, sync::Arc};

use super::{
    claims::{ClaimRegistry, ClaimTable},
    events::{Event, EventLog},
    state::{AgentStateTable, StateSnapshot},
};
use crate::{
    identifiers::{RepoId, RepoUrl},
    Result,
};

/// Mutator applied to a table while the store holds exclusive access.
///
/// Returns `true` when the table changed and must be written back. A mutator
/// may run more than once if a backend retries, so it must not rely on
/// side effects from a previous invocation.
pub type TableMutator<'a, T> = dyn FnMut(&mut T) -> Result<bool> + 'a;

/// Persistence for a single repository namespace.
///
/// `update_*` calls are atomic read-modify-write operations: no two mutators
/// for the same table ever run concurrently, across threads or processes.
/// Loads may run concurrently with writers and always observe a complete
/// table.
pub trait NamespaceStore: Send + Sync + fmt::Debug {
    fn identity(&self) -> &RepoId;

    fn repo_url(&self) -> &RepoUrl;

    /// Create empty tables that do not exist yet. Never clobbers data.
    fn initialize(&self) -> Result<()>;

    fn load_claims(&self) -> Result<ClaimTable>;

    fn update_claims(&self, mutate: &mut TableMutator<'_, ClaimTable>) -> Result<()>;

    /// Append one event. Concurrent appends never interleave partially.
    fn append_event(&self, event: &Event) -> Result<()>;

    /// Events in append order; unreadable records are skipped.
    fn load_events(&self) -> Result<Vec<Event>>;

    fn load_state(&self) -> Result<StateSnapshot>;

    fn update_state(&self, mutate: &mut TableMutator<'_, StateSnapshot>) -> Result<()>;
}

/// Resolves repository URLs to namespaces.
pub trait CoordinationStore: Send + Sync {
    /// Resolve the namespace for `repo_url` without touching storage.
    fn open(&self, repo_url: &RepoUrl) -> Result<Namespace>;

    /// Resolve and initialize the namespace. Safe to call repeatedly and
    /// concurrently; storage failures propagate without retry.
    fn initialize(&self, repo_url: &RepoUrl) -> Result<Namespace> {
        let namespace = self.open(repo_url)?;
        namespace.initialize()?;
        Ok(namespace)
    }
}

/// Handle on one repository's coordination state.
#[derive(Debug, Clone)]
pub struct Namespace {
    store: Arc<dyn NamespaceStore>,
}

impl Namespace {
    pub fn new(store: Arc<dyn NamespaceStore>) -> Self {
        Self { store }
    }

    pub fn id(&self) -> &RepoId {
        self.store.identity()
    }

    pub fn repo_url(&self) -> &RepoUrl {
        self.store.repo_url()
    }

    pub fn initialize(&self) -> Result<()> {
        self.store.initialize()
    }

    pub fn claims(&self) -> ClaimRegistry<'_> {
        ClaimRegistry::new(self.store.as_ref())
    }

    pub fn events(&self) -> EventLog<'_> {
        EventLog::new(self.store.as_ref())
    }

    pub fn agents(&self) -> AgentStateTable<'_> {
        AgentStateTable::new(self.store.as_ref())
    }
}
