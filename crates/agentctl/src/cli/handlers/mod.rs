//! Argument extraction and dispatch to command implementations.

use std::path::PathBuf;

use agentctl_core::{load_config, AgentId, AgentStatus, ClaimPath, Config, RepoUrl};
use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::commands::{
    bus::{self, BusOptions, Sections},
    check::{self, CheckOptions},
    claim::{self, ClaimOptions, ReleaseOptions, ReleaseTarget},
    history::{self, HistoryOptions},
    init::{self, InitOptions},
    notify::{self, NotifyOptions},
    run::{self, RunOptions},
    state::{self, RemoveStateOptions, SetStateOptions},
};

pub async fn dispatch(matches: &ArgMatches) -> Result<()> {
    let config = load_config()
        .await
        .context("Failed to load configuration")?;

    match matches.subcommand() {
        Some(("init", sub_m)) => handle_init(sub_m, &config),
        Some(("claim", sub_m)) => handle_claim(sub_m, &config),
        Some(("release", sub_m)) => handle_release(sub_m, &config),
        Some(("notify", sub_m)) => handle_notify(sub_m, &config),
        Some(("bus", sub_m)) => handle_bus(sub_m, &config),
        Some(("state", sub_m)) => handle_state(sub_m, &config),
        Some(("run", sub_m)) => handle_run(sub_m, &config).await,
        Some(("check", sub_m)) => handle_check(sub_m, &config).await,
        Some(("history", sub_m)) => handle_history(sub_m, &config).await,
        _ => anyhow::bail!("Unknown command. Run 'agentctl --help' for usage."),
    }
}

fn handle_init(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let options = InitOptions {
        repo_url: repo_url(sub_m, "repo-url")?,
    };
    init::run(&options, config)
}

fn handle_claim(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let options = ClaimOptions {
        agent: agent(sub_m)?,
        repo_url: repo_url(sub_m, "repo-url")?,
        path: ClaimPath::parse(required(sub_m, "path")?)?,
    };
    claim::run_claim(&options, config)
}

fn handle_release(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let target = match sub_m.get_one::<String>("path") {
        Some(path) if !sub_m.get_flag("all") => ReleaseTarget::Path(ClaimPath::parse(path)?),
        _ => ReleaseTarget::All,
    };
    let options = ReleaseOptions {
        agent: agent(sub_m)?,
        repo_url: repo_url(sub_m, "repo-url")?,
        target,
    };
    claim::run_release(&options, config)
}

fn handle_notify(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let pairs: Vec<String> = sub_m
        .get_many::<String>("data")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let options = NotifyOptions {
        agent: agent(sub_m)?,
        repo_url: repo_url(sub_m, "repo-url")?,
        kind: notify::parse_kind(required(sub_m, "type")?)?,
        data: notify::parse_data(&pairs)?,
    };
    notify::run(&options, config)
}

fn handle_bus(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let for_agent = sub_m
        .get_one::<String>("for")
        .map(AgentId::parse)
        .transpose()?;
    let options = BusOptions {
        repo_url: repo_url(sub_m, "repo-url")?,
        sections: Sections::from_flags(
            sub_m.get_flag("claims"),
            sub_m.get_flag("messages"),
            sub_m.get_flag("state"),
        ),
        for_agent,
        limit: sub_m
            .get_one::<usize>("limit")
            .copied()
            .unwrap_or(crate::cli::DEFAULT_MESSAGE_LIMIT),
        json: sub_m.get_flag("json"),
    };
    bus::run(&options, config)
}

fn handle_state(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    match sub_m.subcommand() {
        Some(("set", set_m)) => {
            let options = SetStateOptions {
                agent: agent(set_m)?,
                repo_url: repo_url(set_m, "repo-url")?,
                status: AgentStatus::parse(required(set_m, "status")?)?,
                branch: set_m.get_one::<String>("branch").cloned(),
            };
            state::run_set(&options, config)
        }
        Some(("remove", remove_m)) => {
            let options = RemoveStateOptions {
                agent: agent(remove_m)?,
                repo_url: repo_url(remove_m, "repo-url")?,
            };
            state::run_remove(&options, config)
        }
        _ => anyhow::bail!("Unknown state command. Run 'agentctl state --help' for usage."),
    }
}

async fn handle_run(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let repo_url = sub_m
        .get_one::<String>("repo")
        .map(RepoUrl::parse)
        .transpose()?;
    let options = RunOptions {
        agent: agent(sub_m)?,
        task: required(sub_m, "task")?.to_string(),
        repo_url,
        branch: sub_m.get_one::<String>("branch").cloned(),
        attempts: sub_m.get_one::<u32>("attempts").copied(),
        workdir: workdir(sub_m)?,
    };
    run::run(&options, config).await
}

async fn handle_check(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let options = CheckOptions {
        workdir: workdir(sub_m)?,
    };
    check::run(&options, config).await
}

async fn handle_history(sub_m: &ArgMatches, config: &Config) -> Result<()> {
    let options = HistoryOptions {
        agent: agent(sub_m)?,
    };
    history::run(&options, config).await
}

fn required<'a>(sub_m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    sub_m
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing argument: {name}"))
}

fn agent(sub_m: &ArgMatches) -> Result<AgentId> {
    Ok(AgentId::parse(required(sub_m, "agent")?)?)
}

fn repo_url(sub_m: &ArgMatches, name: &str) -> Result<RepoUrl> {
    Ok(RepoUrl::parse(required(sub_m, name)?)?)
}

fn workdir(sub_m: &ArgMatches) -> Result<PathBuf> {
    sub_m.get_one::<String>("workdir").map_or_else(
        || std::env::current_dir().context("Failed to resolve current directory"),
        |dir| Ok(PathBuf::from(dir)),
    )
}
