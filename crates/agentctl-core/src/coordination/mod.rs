//! Per-repository coordination namespace.
//!
//! Every repository URL maps to one namespace holding three independent
//! tables that all agent processes share:
//!
//! - [`ClaimRegistry`]: exclusive, path-scoped claims
//! - [`EventLog`]: append-only log of typed coordination events
//! - [`AgentStateTable`]: latest status per agent
//!
//! Storage is pluggable through [`CoordinationStore`] / [`NamespaceStore`]:
//! [`FileStore`] persists under a shared directory with advisory file locks,
//! [`MemoryStore`] keeps everything in-process for tests.

pub mod claims;
pub mod events;
pub mod file_store;
pub mod lock;
pub mod memory_store;
pub mod namespace;
pub mod state;

pub use claims::{Claim, ClaimOutcome, ClaimRegistry, ClaimTable, ReleaseOutcome};
pub use events::{Audience, Event, EventKind, EventLog, NewEvent};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use namespace::{CoordinationStore, Namespace, NamespaceStore};
pub use state::{AgentState, AgentStateTable, AgentStatus, StateSnapshot};
