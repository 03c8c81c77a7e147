//! Error types for agentctl-core
//!
//! Errors are grouped by what the caller can do about them:
//!
//! - **Validation** (bad identifiers, config, unparseable input): exit code 1
//! - **Storage** (I/O, permissions, lock acquisition): exit code 2
//! - **Lookup** (unknown agent or record): exit code 3
//! - **Coordination** (claim held by someone else): exit code 4
//! - **Retry exhaustion**: exit code 5
//!
//! Conflict, Forbidden and `NotFound` are returned synchronously and never
//! retried automatically.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::retry::TestStatus;

/// Core error type for coordination and retry operations
#[derive(Debug, Error)]
pub enum Error {
    /// Claim attempted on a path held by another agent
    #[error("{path} is claimed by {held_by} (since {})", .since.to_rfc3339())]
    Conflict {
        path: String,
        held_by: String,
        since: DateTime<Utc>,
    },

    /// Release attempted by an agent that does not hold the claim
    #[error("{path} is claimed by {held_by}, not {requested_by}")]
    Forbidden {
        path: String,
        held_by: String,
        requested_by: String,
    },

    /// Unknown agent or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O, permission or locking failure in the backing store
    #[error("Storage error: {0}")]
    Storage(String),

    /// The retry loop ran out of attempts before the task was done
    #[error(
        "task not completed after {attempts} attempts (tests: {test_status}, uncommitted changes: {has_uncommitted_changes})"
    )]
    MaxAttemptsExceeded {
        attempts: u32,
        test_status: TestStatus,
        has_uncommitted_changes: bool,
    },

    /// Input failed validation
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Configuration value out of range or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stored or supplied data could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Process exit code for this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::InvalidConfig(_) | Self::Parse(_) => 1,
            Self::Storage(_) => 2,
            Self::NotFound(_) => 3,
            Self::Conflict { .. } | Self::Forbidden { .. } => 4,
            Self::MaxAttemptsExceeded { .. } => 5,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(format!("Failed to parse config: {err}"))
    }
}

/// Result type alias for agentctl-core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_reports_holder_and_time() {
        let since = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let err = Error::Conflict {
            path: "src/main.rs".to_string(),
            held_by: "agent-1".to_string(),
            since,
        };

        let message = err.to_string();
        assert!(message.contains("src/main.rs"));
        assert!(message.contains("agent-1"));
        assert!(message.contains("2024-05-01T10:00:00"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_max_attempts_reports_last_status() {
        let err = Error::MaxAttemptsExceeded {
            attempts: 3,
            test_status: TestStatus::Fail,
            has_uncommitted_changes: true,
        };

        assert_eq!(
            err.to_string(),
            "task not completed after 3 attempts (tests: fail, uncommitted changes: true)"
        );
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_validation_exit_code() {
        assert_eq!(Error::validation("agent", "empty").exit_code(), 1);
        assert_eq!(Error::NotFound("agent x".into()).exit_code(), 3);
    }
}
