//! In-process coordination store.
//!
//! Same contract as [`super::FileStore`] with every table behind a mutex.
//! Namespaces live as long as the store; opening the same URL twice yields
//! handles on the same state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{
    claims::ClaimTable,
    events::Event,
    namespace::{CoordinationStore, Namespace, NamespaceStore, TableMutator},
    state::StateSnapshot,
};
use crate::{
    identifiers::{RepoId, RepoUrl},
    Error, Result,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<RepoId, Arc<MemoryNamespace>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoordinationStore for MemoryStore {
    fn open(&self, repo_url: &RepoUrl) -> Result<Namespace> {
        let id = repo_url.id();
        let namespace = Arc::clone(
            lock(&self.namespaces)?
                .entry(id.clone())
                .or_insert_with(|| Arc::new(MemoryNamespace::new(id, repo_url.clone()))),
        );
        Ok(Namespace::new(namespace))
    }
}

#[derive(Debug)]
struct MemoryNamespace {
    id: RepoId,
    url: RepoUrl,
    claims: Mutex<ClaimTable>,
    events: Mutex<Vec<Event>>,
    state: Mutex<StateSnapshot>,
}

impl MemoryNamespace {
    fn new(id: RepoId, url: RepoUrl) -> Self {
        Self {
            id,
            url,
            claims: Mutex::default(),
            events: Mutex::default(),
            state: Mutex::default(),
        }
    }
}

impl NamespaceStore for MemoryNamespace {
    fn identity(&self) -> &RepoId {
        &self.id
    }

    fn repo_url(&self) -> &RepoUrl {
        &self.url
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn load_claims(&self) -> Result<ClaimTable> {
        Ok(lock(&self.claims)?.clone())
    }

    fn update_claims(&self, mutate: &mut TableMutator<'_, ClaimTable>) -> Result<()> {
        update(&self.claims, mutate)
    }

    fn append_event(&self, event: &Event) -> Result<()> {
        lock(&self.events)?.push(event.clone());
        Ok(())
    }

    fn load_events(&self) -> Result<Vec<Event>> {
        Ok(lock(&self.events)?.clone())
    }

    fn load_state(&self) -> Result<StateSnapshot> {
        Ok(lock(&self.state)?.clone())
    }

    fn update_state(&self, mutate: &mut TableMutator<'_, StateSnapshot>) -> Result<()> {
        update(&self.state, mutate)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::storage("in-memory coordination table is poisoned"))
}

/// Run `mutate` on a scratch copy and commit it only on success, so a failed
/// mutator leaves the table untouched.
fn update<T: Clone>(mutex: &Mutex<T>, mutate: &mut TableMutator<'_, T>) -> Result<()> {
    let mut guard = lock(mutex)?;
    let mut scratch = guard.clone();
    if mutate(&mut scratch)? {
        *guard = scratch;
    }
    Ok(())
}
