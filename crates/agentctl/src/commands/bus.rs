//! `agentctl bus` - read-only view of a namespace.

use agentctl_core::{
    AgentId, Claim, Config, CoordinationStore, Event, FileStore, Namespace, RepoUrl,
    StateSnapshot,
};
use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Which parts of the bus to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections {
    pub claims: bool,
    pub messages: bool,
    pub state: bool,
}

impl Sections {
    /// Selected sections, or all of them when no flag was given.
    pub const fn from_flags(claims: bool, messages: bool, state: bool) -> Self {
        if claims || messages || state {
            Self {
                claims,
                messages,
                state,
            }
        } else {
            Self {
                claims: true,
                messages: true,
                state: true,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusOptions {
    pub repo_url: RepoUrl,
    pub sections: Sections,
    /// Restrict messages to those relevant to one agent.
    pub for_agent: Option<AgentId>,
    pub limit: usize,
    pub json: bool,
}

/// Everything `bus` shows, in its JSON shape.
#[derive(Debug, Clone, Serialize)]
pub struct BusView {
    pub repo_url: String,
    pub repo_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Vec<Claim>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Event>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateSnapshot>,
}

pub fn run(options: &BusOptions, config: &Config) -> Result<()> {
    let namespace = FileStore::from_config(config)
        .open(&options.repo_url)
        .with_context(|| format!("Failed to open coordination namespace for {}", options.repo_url))?;
    let view = collect(&namespace, options)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render(&view));
    }
    Ok(())
}

/// Read the selected sections from `namespace`.
pub fn collect(namespace: &Namespace, options: &BusOptions) -> Result<BusView> {
    let claims = options
        .sections
        .claims
        .then(|| namespace.claims().list())
        .transpose()?;

    let messages = options
        .sections
        .messages
        .then(|| recent_messages(namespace, options.for_agent.as_ref(), options.limit))
        .transpose()?;

    let state = options
        .sections
        .state
        .then(|| namespace.agents().snapshot())
        .transpose()?;

    Ok(BusView {
        repo_url: namespace.repo_url().to_string(),
        repo_id: namespace.id().to_string(),
        claims,
        messages,
        state,
    })
}

fn recent_messages(
    namespace: &Namespace,
    for_agent: Option<&AgentId>,
    limit: usize,
) -> agentctl_core::Result<Vec<Event>> {
    match for_agent {
        None => namespace.events().tail(limit),
        Some(agent) => {
            let mut events = namespace.events().read_for_agent(agent)?;
            let skip = events.len().saturating_sub(limit);
            Ok(events.split_off(skip))
        }
    }
}

/// Human-readable rendering of the sections present in `view`.
pub fn render(view: &BusView) -> String {
    [
        view.claims.as_deref().map(render_claims),
        view.messages.as_deref().map(render_messages),
        view.state.as_ref().map(render_state),
    ]
    .into_iter()
    .flatten()
    .join("\n")
}

pub fn render_claims(claims: &[Claim]) -> String {
    let body = if claims.is_empty() {
        vec!["  (no active claims)".to_string()]
    } else {
        claims
            .iter()
            .map(|claim| {
                format!(
                    "  {:<40}  {} (since {})",
                    claim.path.as_str(),
                    claim.agent,
                    claim.claimed_at.to_rfc3339()
                )
            })
            .collect()
    };
    section("File Claims:", body)
}

pub fn render_messages(events: &[Event]) -> String {
    let body = if events.is_empty() {
        vec!["  (no messages)".to_string()]
    } else {
        events
            .iter()
            .map(|event| {
                let data = event
                    .data
                    .iter()
                    .map(|(key, value)| format!(" {key}={value}"))
                    .join("");
                format!(
                    "  [{}] {:<15} {:<15}{data}",
                    event.timestamp.format("%H:%M:%S"),
                    event.kind.as_ref(),
                    event.agent.as_str()
                )
            })
            .collect()
    };
    section("Recent Messages:", body)
}

pub fn render_state(snapshot: &StateSnapshot) -> String {
    let body = if snapshot.agents.is_empty() {
        vec!["  (no agents registered)".to_string()]
    } else {
        snapshot
            .agents
            .values()
            .map(|state| {
                format!(
                    "  {:<15} status={:<10} branch={:<20} updated={}",
                    state.name.as_str(),
                    state.status.to_string(),
                    state.branch.as_deref().unwrap_or(""),
                    state.last_update.to_rfc3339()
                )
            })
            .collect()
    };
    section("Agent State:", body)
}

fn section(title: &str, body: Vec<String>) -> String {
    let mut lines = vec![title.to_string(), RULE.to_string()];
    lines.extend(body);
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use agentctl_core::{AgentStatus, ClaimPath, EventKind, MemoryStore, NewEvent};

    use super::*;

    fn options(sections: Sections) -> BusOptions {
        BusOptions {
            repo_url: RepoUrl::parse("https://github.com/user/repo").unwrap(),
            sections,
            for_agent: None,
            limit: 20,
            json: false,
        }
    }

    fn populated() -> Namespace {
        let store = MemoryStore::new();
        let namespace = store
            .initialize(&RepoUrl::parse("https://github.com/user/repo").unwrap())
            .unwrap();
        let a = AgentId::parse("agent-a").unwrap();
        let b = AgentId::parse("agent-b").unwrap();
        namespace
            .claims()
            .claim(&a, &ClaimPath::parse("src/main.rs").unwrap())
            .unwrap();
        namespace
            .events()
            .publish(NewEvent::new(EventKind::Committed, b.clone()).with_data("sha", "abc123"))
            .unwrap();
        namespace
            .agents()
            .update(&b, AgentStatus::Working, Some("feature/x"))
            .unwrap();
        namespace
    }

    #[test]
    fn test_no_flags_selects_everything() {
        assert_eq!(
            Sections::from_flags(false, false, false),
            Sections {
                claims: true,
                messages: true,
                state: true
            }
        );
        assert_eq!(
            Sections::from_flags(true, false, false),
            Sections {
                claims: true,
                messages: false,
                state: false
            }
        );
    }

    #[test]
    fn test_collect_only_selected_sections() {
        let namespace = populated();
        let view = collect(&namespace, &options(Sections::from_flags(true, false, false))).unwrap();

        assert_eq!(view.claims.as_ref().map(Vec::len), Some(1));
        assert!(view.messages.is_none());
        assert!(view.state.is_none());
    }

    #[test]
    fn test_messages_respect_limit_and_audience() {
        let namespace = populated();
        let mut opts = options(Sections::from_flags(false, true, false));
        opts.limit = 1;
        let view = collect(&namespace, &opts).unwrap();
        let messages = view.messages.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, EventKind::Committed);

        // agent-b's commit is not relevant to agent-c
        opts.limit = 20;
        opts.for_agent = Some(AgentId::parse("agent-c").unwrap());
        let view = collect(&namespace, &opts).unwrap();
        assert_eq!(view.messages.as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn test_render_layout() {
        let namespace = populated();
        let view = collect(&namespace, &options(Sections::from_flags(false, false, false))).unwrap();
        let text = render(&view);

        assert!(text.contains("File Claims:"));
        assert!(text.contains("src/main.rs"));
        assert!(text.contains("agent-a (since "));
        assert!(text.contains("Recent Messages:"));
        assert!(text.contains(" sha=abc123"));
        assert!(text.contains("Agent State:"));
        assert!(text.contains("status=working"));
        assert!(text.contains("branch=feature/x"));
    }

    #[test]
    fn test_render_empty_sections() {
        assert!(render_claims(&[]).contains("(no active claims)"));
        assert!(render_messages(&[]).contains("(no messages)"));
        assert!(render_state(&StateSnapshot::default()).contains("(no agents registered)"));
    }
}
