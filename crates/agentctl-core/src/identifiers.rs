//! Validated identifiers: agents, repositories and claimable paths.
//!
//! Each type is a newtype that can only be built through its parser, so any
//! value in hand has already passed validation (parse, don't validate).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Reserved keywords that cannot be used as agent IDs.
const RESERVED_KEYWORDS: &[&str] = &["null", "undefined", "true", "false", "none", "default"];

/// Maximum allowed length for agent ID.
const MAX_AGENT_ID_LENGTH: usize = 128;

/// Number of digest bytes kept for a repository identity (12 hex characters).
const REPO_ID_BYTES: usize = 6;

// ═══════════════════════════════════════════════════════════════════════════
// AGENT ID
// ═══════════════════════════════════════════════════════════════════════════

/// Validated agent name.
///
/// ASCII alphanumerics plus `-`, `_` and `.`, at most 128 characters, and not
/// a reserved keyword.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Parse and validate an agent ID.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(Error::validation("agent", "agent name cannot be empty"));
        }

        if trimmed.len() > MAX_AGENT_ID_LENGTH {
            return Err(Error::validation(
                "agent",
                format!("agent name exceeds maximum length of {MAX_AGENT_ID_LENGTH} characters"),
            ));
        }

        let invalid_chars: String = trimmed
            .chars()
            .filter(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
            .collect();
        if !invalid_chars.is_empty() {
            return Err(Error::validation(
                "agent",
                format!("agent name contains invalid characters: {invalid_chars}"),
            ));
        }

        let lower = trimmed.to_lowercase();
        if RESERVED_KEYWORDS.contains(&lower.as_str()) {
            return Err(Error::validation(
                "agent",
                format!("'{trimmed}' is a reserved keyword"),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AgentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AgentId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl PartialEq<str> for AgentId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REPOSITORY URL AND IDENTITY
// ═══════════════════════════════════════════════════════════════════════════

/// Canonical repository URL.
///
/// Surrounding whitespace and trailing slashes are removed so that trivially
/// different spellings of one URL share a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoUrl(String);

impl RepoUrl {
    pub fn parse(s: impl AsRef<str>) -> Result<Self> {
        let canonical = s.as_ref().trim().trim_end_matches('/');
        if canonical.is_empty() {
            return Err(Error::validation(
                "repo_url",
                "repository URL cannot be empty",
            ));
        }
        Ok(Self(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace this repository maps to.
    pub fn id(&self) -> RepoId {
        RepoId::from_url(self)
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Short, stable digest naming one repository's coordination namespace.
///
/// First 12 hex characters of SHA-256 over the canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoId(String);

impl RepoId {
    pub fn from_url(url: &RepoUrl) -> Self {
        let digest = Sha256::digest(url.as_str().as_bytes());
        Self(hex::encode(&digest[..REPO_ID_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLAIM PATH
// ═══════════════════════════════════════════════════════════════════════════

/// Repository-relative path used as a claim key.
///
/// Paths are opaque keys: nothing is resolved against the filesystem. A
/// leading `./` is dropped so `./src/lib.rs` and `src/lib.rs` collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimPath(String);

impl ClaimPath {
    pub fn parse(s: impl AsRef<str>) -> Result<Self> {
        let trimmed = s.as_ref().trim();
        let normalized = trimmed.strip_prefix("./").unwrap_or(trimmed);

        if normalized.is_empty() {
            return Err(Error::validation("path", "claim path cannot be empty"));
        }
        if normalized.contains('\0') {
            return Err(Error::validation(
                "path",
                "claim path cannot contain NUL bytes",
            ));
        }

        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClaimPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClaimPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ClaimPath> for String {
    fn from(path: ClaimPath) -> Self {
        path.0
    }
}
