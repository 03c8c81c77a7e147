//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: `<config dir>/agentctl/config.toml`
//! 3. Project config: `.agentctl/config.toml`
//! 4. Environment variables: `AGENTCTL_*`
//! 5. CLI flags (command-specific)
//!
//! # Example Config
//!
//! ```toml
//! coordination_dir = "~/.agentctl/coordination"
//! history_dir = "~/.agentctl/history"
//!
//! [retry]
//! max_attempts = 10
//! settle_delay_ms = 2000
//! backoff_ms = 3000
//!
//! [agent]
//! command = "claude"
//! args = ["--dangerously-skip-permissions", "-p"]
//!
//! [probe]
//! test_command = "cargo test"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{retry::RetryPolicy, Error, Result};

/// Largest accepted config file.
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Upper bound for settle and backoff delays.
const MAX_DELAY_MS: u64 = 600_000;

/// Upper bound for the attempt budget.
const MAX_ATTEMPTS_LIMIT: u32 = 1000;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of all coordination namespaces.
    pub coordination_dir: PathBuf,
    /// Where completion records are written.
    pub history_dir: PathBuf,
    pub retry: RetryConfig,
    pub agent: AgentConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub settle_delay_ms: u64,
    pub backoff_ms: u64,
}

/// The coding-agent CLI invoked for each attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub command: String,
    /// Arguments placed before the prompt.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Shell command deciding pass/fail; detected from the project if unset.
    pub test_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let base = agentctl_home();
        Self {
            coordination_dir: base.join("coordination"),
            history_dir: base.join("history"),
            retry: RetryConfig::default(),
            agent: AgentConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            settle_delay_ms: duration_ms(policy.settle_delay),
            backoff_ms: duration_ms(policy.backoff),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec![
                "--dangerously-skip-permissions".to_string(),
                "-p".to_string(),
            ],
        }
    }
}

impl RetryConfig {
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PARTIAL CONFIG - only keys present in a file override lower layers
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub coordination_dir: Option<String>,
    pub history_dir: Option<String>,
    pub retry: Option<PartialRetryConfig>,
    pub agent: Option<PartialAgentConfig>,
    pub probe: Option<PartialProbeConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialRetryConfig {
    pub max_attempts: Option<u32>,
    pub settle_delay_ms: Option<u64>,
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialAgentConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialProbeConfig {
    pub test_command: Option<String>,
}

impl Config {
    pub fn merge_partial(&mut self, partial: PartialConfig) {
        if let Some(dir) = partial.coordination_dir {
            self.coordination_dir = expand_home(&dir);
        }
        if let Some(dir) = partial.history_dir {
            self.history_dir = expand_home(&dir);
        }
        if let Some(retry) = partial.retry {
            if let Some(value) = retry.max_attempts {
                self.retry.max_attempts = value;
            }
            if let Some(value) = retry.settle_delay_ms {
                self.retry.settle_delay_ms = value;
            }
            if let Some(value) = retry.backoff_ms {
                self.retry.backoff_ms = value;
            }
        }
        if let Some(agent) = partial.agent {
            if let Some(command) = agent.command {
                self.agent.command = command;
            }
            if let Some(args) = agent.args {
                self.agent.args = args;
            }
        }
        if let Some(probe) = partial.probe {
            if probe.test_command.is_some() {
                self.probe.test_command = probe.test_command;
            }
        }
    }

    /// Apply `AGENTCTL_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable does not parse
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("AGENTCTL_COORDINATION_DIR") {
            self.coordination_dir = expand_home(&value);
        }

        if let Some(value) = lookup("AGENTCTL_HISTORY_DIR") {
            self.history_dir = expand_home(&value);
        }

        if let Some(value) = lookup("AGENTCTL_MAX_ATTEMPTS") {
            self.retry.max_attempts = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid AGENTCTL_MAX_ATTEMPTS value: {e}"))
            })?;
        }

        if let Some(value) = lookup("AGENTCTL_SETTLE_DELAY_MS") {
            self.retry.settle_delay_ms = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid AGENTCTL_SETTLE_DELAY_MS value: {e}"))
            })?;
        }

        if let Some(value) = lookup("AGENTCTL_BACKOFF_MS") {
            self.retry.backoff_ms = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("Invalid AGENTCTL_BACKOFF_MS value: {e}"))
            })?;
        }

        if let Some(value) = lookup("AGENTCTL_AGENT_COMMAND") {
            self.agent.command = value;
        }

        if let Some(value) = lookup("AGENTCTL_TEST_COMMAND") {
            self.probe.test_command = Some(value).filter(|v| !v.trim().is_empty());
        }

        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any values are out of range or invalid
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "retry.max_attempts must be 1-{MAX_ATTEMPTS_LIMIT}"
            )));
        }

        if self.retry.settle_delay_ms > MAX_DELAY_MS || self.retry.backoff_ms > MAX_DELAY_MS {
            return Err(Error::InvalidConfig(format!(
                "retry delays must not exceed {MAX_DELAY_MS} ms"
            )));
        }

        if self.agent.command.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "agent.command cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load configuration from all sources
///
/// # Errors
///
/// Returns error if:
/// - A config file is malformed TOML or has unknown keys
/// - An environment override does not parse
/// - Config values fail validation
pub async fn load_config() -> Result<Config> {
    // 1. Start with built-in defaults
    let mut config = Config::default();

    // 2. Global config, if any
    if let Some(global_path) = global_config_path() {
        if let Some(global) = load_partial_toml_file(&global_path).await? {
            config.merge_partial(global);
        }
    }

    // 3. Project config, if any
    if let Ok(dir) = std::env::current_dir() {
        if let Some(project) = load_partial_toml_file(&dir.join(".agentctl/config.toml")).await? {
            config.merge_partial(project);
        }
    }

    // 4. Environment variable overrides
    config.apply_env_vars()?;

    // 5. Validate
    config.validate()?;

    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

/// Get path to global config file
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "agentctl")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// `~/.agentctl`, or `.agentctl` relative to the working directory when no
/// home directory is known.
fn agentctl_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".agentctl"))
        .unwrap_or_else(|| PathBuf::from(".agentctl"))
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), directories::BaseDirs::new()) {
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => PathBuf::from(path),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Load a TOML file into a [`PartialConfig`]. A missing file yields `None`.
///
/// # Errors
///
/// Returns error if:
/// - File exists but cannot be read
/// - File is too large
/// - TOML is malformed or contains unknown keys
pub async fn load_partial_toml_file(path: &Path) -> Result<Option<PartialConfig>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::storage(format!(
                "Failed to read config file metadata {}: {e}",
                path.display()
            )))
        }
    };

    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(Error::InvalidConfig(format!(
            "Config file {} exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::storage(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Parse(format!("Failed to parse config {}: {e}", path.display())))
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.coordination_dir.ends_with(".agentctl/coordination"));
        assert!(config.history_dir.ends_with(".agentctl/history"));
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.settle_delay_ms, 2000);
        assert_eq!(config.retry.backoff_ms, 3000);
        assert_eq!(config.agent.command, "claude");
        assert!(config.probe.test_command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_merge_only_overrides_present_keys() -> Result<()> {
        let mut config = Config::default();
        let partial: PartialConfig = toml::from_str(
            r#"
            coordination_dir = "/srv/coordination"

            [retry]
            max_attempts = 4
            "#,
        )?;

        config.merge_partial(partial);

        assert_eq!(config.coordination_dir, PathBuf::from("/srv/coordination"));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.backoff_ms, 3000);
        assert_eq!(config.agent.command, "claude");
        Ok(())
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let parsed: std::result::Result<PartialConfig, _> =
            toml::from_str("[retry]\nmax_attemps = 3\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AGENTCTL_COORDINATION_DIR", "/tmp/coord"),
            ("AGENTCTL_MAX_ATTEMPTS", "3"),
            ("AGENTCTL_SETTLE_DELAY_MS", "0"),
            ("AGENTCTL_TEST_COMMAND", "make test"),
        ]);
        let mut config = Config::default();

        config.apply_env_with(|key| vars.get(key).map(ToString::to_string))?;

        assert_eq!(config.coordination_dir, PathBuf::from("/tmp/coord"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.policy().settle_delay, Duration::ZERO);
        assert_eq!(config.probe.test_command.as_deref(), Some("make test"));
        Ok(())
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let mut config = Config::default();
        let result = config.apply_env_with(|key| {
            (key == "AGENTCTL_MAX_ATTEMPTS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.backoff_ms = MAX_DELAY_MS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agent.command = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(expand_home("~/x"), dirs.home_dir().join("x"));
        }
    }

    #[tokio::test]
    async fn test_load_partial_file() -> Result<()> {
        let temp_dir = TempDir::new()
            .map_err(|e| Error::storage(format!("Failed to create temp dir: {e}")))?;
        let path = temp_dir.path().join("config.toml");

        assert!(load_partial_toml_file(&path).await?.is_none());

        tokio::fs::write(&path, "[agent]\ncommand = \"codex\"\n").await?;
        let partial = load_partial_toml_file(&path).await?;
        let command = partial.and_then(|p| p.agent).and_then(|a| a.command);
        assert_eq!(command.as_deref(), Some("codex"));

        tokio::fs::write(&path, "retry = 3 = 4").await?;
        assert!(matches!(
            load_partial_toml_file(&path).await,
            Err(Error::Parse(_))
        ));
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_load_config_reads_process_env() -> Result<()> {
        std::env::set_var("AGENTCTL_BACKOFF_MS", "25");
        let loaded = load_config().await;
        std::env::remove_var("AGENTCTL_BACKOFF_MS");

        assert_eq!(loaded?.retry.backoff_ms, 25);
        Ok(())
    }
}
