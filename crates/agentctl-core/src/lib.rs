//! # agentctl core
//!
//! Coordination primitives for coding agents that work on the same repository
//! from independent processes, and the retry loop that drives one agent's task
//! to completion.
//!
//! This crate provides:
//! - A per-repository coordination namespace ([`coordination`]): exclusive
//!   path claims, an append-only event log and a shared agent-state table
//! - File-backed and in-memory stores behind one [`CoordinationStore`] contract
//! - The [`RetryController`] completion loop with pluggable executor and probe
//! - Layered configuration and completion history
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` / `expect()` / `panic!()` outside tests
//! - No `unsafe` - safe Rust only
//!
//! All fallible operations return [`Result<T>`] with the crate [`Error`].

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod coordination;
pub mod error;
pub mod history;
pub mod identifiers;
pub mod retry;

pub use config::{load_config, Config};
pub use coordination::{
    AgentState, AgentStateTable, AgentStatus, Audience, Claim, ClaimOutcome, ClaimRegistry,
    CoordinationStore, Event, EventKind, EventLog, FileStore, MemoryStore, Namespace,
    NamespaceStore, NewEvent, ReleaseOutcome, StateSnapshot,
};
pub use error::{Error, Result};
pub use history::{CompletionRecord, HistoryStore, Outcome};
pub use identifiers::{AgentId, ClaimPath, RepoId, RepoUrl};
pub use retry::{
    ProbeReport, RetryController, RetryPolicy, RunReport, RunRequest, StatusProbe, TaskExecutor,
    TestStatus,
};
