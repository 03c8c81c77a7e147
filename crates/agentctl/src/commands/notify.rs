//! `agentctl notify`

use agentctl_core::{AgentId, Config, Error, EventKind, NewEvent, RepoUrl};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct NotifyOptions {
    pub agent: AgentId,
    pub repo_url: RepoUrl,
    pub kind: EventKind,
    pub data: Vec<(String, String)>,
}

/// Parse an event type an agent may publish directly.
pub fn parse_kind(s: &str) -> Result<EventKind, Error> {
    let kind = EventKind::parse(s)?;
    if kind.is_publishable() {
        Ok(kind)
    } else {
        Err(Error::validation(
            "event type",
            format!("'{kind}' events are recorded by claim and release"),
        ))
    }
}

/// Parse `key=value` arguments. Values may contain `=`.
pub fn parse_data(pairs: &[String]) -> Result<Vec<(String, String)>, Error> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(Error::validation(
                "data",
                format!("expected key=value, got '{pair}'"),
            )),
        })
        .collect()
}

pub fn run(options: &NotifyOptions, config: &Config) -> Result<()> {
    let namespace = super::namespace(config, &options.repo_url)?;

    let draft = options
        .data
        .iter()
        .fold(NewEvent::new(options.kind, options.agent.clone()), |draft, (key, value)| {
            draft.with_data(key.as_str(), value.as_str())
        });
    let event = namespace.events().publish(draft)?;

    println!("✓ Published {} from {}", event.kind, event.agent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_rejects_registry_events() {
        assert_eq!(parse_kind("pr_created").ok(), Some(EventKind::PrCreated));
        assert!(matches!(parse_kind("claim"), Err(Error::Validation { .. })));
        assert!(matches!(parse_kind("release"), Err(Error::Validation { .. })));
        assert!(matches!(parse_kind("deployed"), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_parse_data_pairs() {
        let pairs = vec!["sha=abc123".to_string(), "note=a=b".to_string()];
        let parsed = parse_data(&pairs).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("sha".to_string(), "abc123".to_string()),
                ("note".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_data_rejects_bare_words() {
        assert!(parse_data(&["oops".to_string()]).is_err());
        assert!(parse_data(&["=value".to_string()]).is_err());
    }
}
