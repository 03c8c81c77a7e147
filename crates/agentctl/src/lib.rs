//! agentctl - coordinate coding agents that share a repository
//!
//! Command-line surface over `agentctl-core`: claims, the event bus, agent
//! state, and the completion-driven `run` loop backed by local processes.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod workdir;
