pub mod handlers;
pub mod setup;

use clap::{value_parser, Arg, ArgAction, Command};

/// Messages shown by `bus` when `--limit` is not given.
pub const DEFAULT_MESSAGE_LIMIT: usize = 20;

pub fn build_cli() -> Command {
    Command::new("agentctl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Coordinate coding agents that share a repository")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging on stderr"),
        )
        .subcommand(cmd_init())
        .subcommand(cmd_claim())
        .subcommand(cmd_release())
        .subcommand(cmd_notify())
        .subcommand(cmd_bus())
        .subcommand(cmd_state())
        .subcommand(cmd_run())
        .subcommand(cmd_check())
        .subcommand(cmd_history())
}

fn agent_arg() -> Arg {
    Arg::new("agent").required(true).help("Agent name")
}

fn repo_arg() -> Arg {
    Arg::new("repo-url")
        .required(true)
        .help("Repository URL identifying the coordination namespace")
}

fn workdir_arg() -> Arg {
    Arg::new("workdir")
        .long("workdir")
        .value_name("DIR")
        .help("Working copy the agent operates in (default: current directory)")
}

fn cmd_init() -> Command {
    Command::new("init")
        .about("Create the coordination namespace for a repository")
        .arg(repo_arg())
}

fn cmd_claim() -> Command {
    Command::new("claim")
        .about("Claim a path for exclusive editing")
        .arg(agent_arg())
        .arg(repo_arg())
        .arg(Arg::new("path").required(true).help("Path to claim"))
}

fn cmd_release() -> Command {
    Command::new("release")
        .about("Release a claimed path")
        .arg(agent_arg())
        .arg(repo_arg())
        .arg(
            Arg::new("path")
                .required_unless_present("all")
                .help("Path to release"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .action(ArgAction::SetTrue)
                .conflicts_with("path")
                .help("Release every claim held by the agent"),
        )
}

fn cmd_notify() -> Command {
    Command::new("notify")
        .about("Publish a coordination event")
        .after_help("Types: committed, pushed, pr_created, merged, rebase_needed")
        .arg(agent_arg())
        .arg(repo_arg())
        .arg(Arg::new("type").required(true).help("Event type"))
        .arg(
            Arg::new("data")
                .num_args(0..)
                .value_name("KEY=VALUE")
                .help("Event payload; target=<agent> addresses rebase_needed"),
        )
}

fn cmd_bus() -> Command {
    Command::new("bus")
        .about("Show claims, recent events and agent state")
        .arg(repo_arg())
        .arg(
            Arg::new("claims")
                .long("claims")
                .action(ArgAction::SetTrue)
                .help("Show claims"),
        )
        .arg(
            Arg::new("messages")
                .long("messages")
                .action(ArgAction::SetTrue)
                .help("Show recent events"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .action(ArgAction::SetTrue)
                .help("Show agent state"),
        )
        .arg(
            Arg::new("for")
                .long("for")
                .value_name("AGENT")
                .help("Only events relevant to this agent"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("20")
                .help("Number of recent events to show"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print as JSON"),
        )
}

fn cmd_state() -> Command {
    Command::new("state")
        .about("Manage agent state")
        .subcommand_required(true)
        .subcommand(
            Command::new("set")
                .about("Record an agent's status")
                .arg(agent_arg())
                .arg(repo_arg())
                .arg(
                    Arg::new("status")
                        .required(true)
                        .help("working, idle, done or blocked"),
                )
                .arg(
                    Arg::new("branch")
                        .long("branch")
                        .value_name("BRANCH")
                        .help("Branch the agent works on"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an agent's state entry")
                .arg(agent_arg())
                .arg(repo_arg()),
        )
}

fn cmd_run() -> Command {
    Command::new("run")
        .about("Run the agent until tests pass and all changes are committed")
        .arg(agent_arg())
        .arg(Arg::new("task").required(true).help("Task description"))
        .arg(
            Arg::new("repo")
                .long("repo")
                .value_name("URL")
                .help("Coordinate through this repository's namespace"),
        )
        .arg(
            Arg::new("branch")
                .long("branch")
                .value_name("BRANCH")
                .help("Branch reported in agent state"),
        )
        .arg(
            Arg::new("attempts")
                .long("attempts")
                .value_name("N")
                .value_parser(value_parser!(u32))
                .help("Maximum attempts (default from config)"),
        )
        .arg(workdir_arg())
}

fn cmd_check() -> Command {
    Command::new("check")
        .about("Probe the working copy once and report completion")
        .arg(workdir_arg())
}

fn cmd_history() -> Command {
    Command::new("history")
        .about("Show an agent's last completion record")
        .arg(agent_arg())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_release_requires_path_or_all() {
        let cli = build_cli();
        assert!(cli
            .clone()
            .try_get_matches_from(["agentctl", "release", "a", "https://h/r"])
            .is_err());
        assert!(cli
            .clone()
            .try_get_matches_from(["agentctl", "release", "a", "https://h/r", "--all"])
            .is_ok());
        assert!(cli
            .try_get_matches_from(["agentctl", "release", "a", "https://h/r", "x", "--all"])
            .is_err());
    }

    #[test]
    fn test_bus_limit_defaults() {
        let matches = build_cli()
            .try_get_matches_from(["agentctl", "bus", "https://h/r"])
            .unwrap();
        let (_, bus) = matches.subcommand().unwrap();
        assert_eq!(
            bus.get_one::<usize>("limit").copied(),
            Some(DEFAULT_MESSAGE_LIMIT)
        );
    }
}
