//! Completion history.
//!
//! One JSON record per agent at `<history_dir>/<agent>.json`, overwritten by
//! each completed run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{identifiers::AgentId, Config, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Success,
}

/// Record of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub agent: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    pub outcome: Outcome,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.history_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, agent: &AgentId) -> PathBuf {
        self.dir.join(format!("{agent}.json"))
    }

    /// Write `record`, replacing any earlier record for the same agent.
    pub async fn save(&self, record: &CompletionRecord) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::storage(format!(
                "Failed to create history directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.record_path(&record.agent);
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, json).await.map_err(|e| {
            Error::storage(format!(
                "Failed to write history record {}: {e}",
                path.display()
            ))
        })?;
        Ok(path)
    }

    pub async fn load(&self, agent: &AgentId) -> Result<CompletionRecord> {
        let path = self.record_path(agent);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "no completion history for agent '{agent}'"
                )))
            }
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to read history record {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| Error::Parse(format!("Failed to parse {}: {e}", path.display())))
    }
}
