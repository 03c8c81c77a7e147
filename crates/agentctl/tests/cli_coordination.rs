//! End-to-end tests of the coordination commands against a temporary
//! coordination directory.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const REPO: &str = "https://github.com/user/repo";

struct TestEnv {
    root: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_agentctl"));
        cmd.current_dir(self.root.path())
            .env("AGENTCTL_COORDINATION_DIR", self.root.path().join("coordination"))
            .env("AGENTCTL_HISTORY_DIR", self.root.path().join("history"))
            .env("HOME", self.root.path())
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn init_reports_namespace_directory() {
    let env = TestEnv::new();

    env.cmd()
        .args(["init", REPO])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Initialized coordination for"))
        .stdout(predicate::str::contains("coordination"));
}

#[test]
fn claim_conflict_names_holder_and_exits_4() {
    let env = TestEnv::new();

    env.cmd()
        .args(["claim", "agent-a", REPO, "src/main.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Claimed src/main.rs for agent-a"));

    // Idempotent for the holder
    env.cmd()
        .args(["claim", "agent-a", REPO, "src/main.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already claimed by agent-a"));

    env.cmd()
        .args(["claim", "agent-b", REPO, "src/main.rs"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("claimed by agent-a"))
        .stderr(predicate::str::contains("since"));
}

#[test]
fn release_by_non_holder_is_forbidden() {
    let env = TestEnv::new();

    env.cmd()
        .args(["claim", "agent-a", REPO, "src/main.rs"])
        .assert()
        .success();

    env.cmd()
        .args(["release", "agent-b", REPO, "src/main.rs"])
        .assert()
        .code(4);

    env.cmd()
        .args(["release", "agent-a", REPO, "src/main.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Released src/main.rs from agent-a"));

    env.cmd()
        .args(["release", "agent-b", REPO, "src/main.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is not claimed"));
}

#[test]
fn release_all_drops_only_own_claims() {
    let env = TestEnv::new();

    for path in ["a.rs", "b.rs"] {
        env.cmd()
            .args(["claim", "agent-a", REPO, path])
            .assert()
            .success();
    }
    env.cmd()
        .args(["claim", "agent-b", REPO, "c.rs"])
        .assert()
        .success();

    env.cmd()
        .args(["release", "agent-a", REPO, "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released 2 claim(s)"));

    env.cmd()
        .args(["bus", REPO, "--claims"])
        .assert()
        .success()
        .stdout(predicate::str::contains("c.rs"))
        .stdout(predicate::str::contains("a.rs").not());
}

#[test]
fn notify_appears_on_bus() {
    let env = TestEnv::new();

    env.cmd()
        .args(["notify", "agent-a", REPO, "committed", "sha=abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Published committed from agent-a"));

    env.cmd()
        .args(["bus", REPO, "--messages"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recent Messages:"))
        .stdout(predicate::str::contains("committed"))
        .stdout(predicate::str::contains("sha=abc123"))
        .stdout(predicate::str::contains("File Claims:").not());
}

#[test]
fn notify_rejects_unknown_and_registry_kinds() {
    let env = TestEnv::new();

    env.cmd()
        .args(["notify", "agent-a", REPO, "deployed"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown event type"));

    env.cmd()
        .args(["notify", "agent-a", REPO, "claim", "path=x.rs"])
        .assert()
        .code(1);

    env.cmd()
        .args(["notify", "agent-a", REPO, "pushed", "not-a-pair"])
        .assert()
        .code(1);
}

#[test]
fn state_set_and_remove() {
    let env = TestEnv::new();

    env.cmd()
        .args(["state", "set", "agent-a", REPO, "working", "--branch", "feature/x"])
        .assert()
        .success();

    env.cmd()
        .args(["bus", REPO, "--state"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=working"))
        .stdout(predicate::str::contains("branch=feature/x"));

    env.cmd()
        .args(["state", "set", "agent-a", REPO, "sleeping"])
        .assert()
        .code(1);

    env.cmd()
        .args(["state", "remove", "agent-a", REPO])
        .assert()
        .success();

    env.cmd()
        .args(["state", "remove", "agent-a", REPO])
        .assert()
        .code(3);
}

#[test]
fn bus_json_is_machine_readable() {
    let env = TestEnv::new();

    env.cmd()
        .args(["claim", "agent-a", REPO, "src/lib.rs"])
        .assert()
        .success();

    let output = env
        .cmd()
        .args(["bus", REPO, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["repo_url"], REPO);
    assert_eq!(view["claims"][0]["agent"], "agent-a");
    assert_eq!(view["claims"][0]["path"], "src/lib.rs");
    assert_eq!(view["messages"][0]["type"], "claim");
    assert!(view["state"]["agents"].as_object().unwrap().is_empty());
}

#[test]
fn trailing_slash_shares_namespace() {
    let env = TestEnv::new();

    env.cmd()
        .args(["claim", "agent-a", REPO, "x.rs"])
        .assert()
        .success();

    let with_slash = format!("{REPO}/");
    env.cmd()
        .args(["claim", "agent-b", with_slash.as_str(), "x.rs"])
        .assert()
        .code(4);
}

#[test]
fn invalid_agent_name_is_rejected() {
    let env = TestEnv::new();

    env.cmd()
        .args(["claim", "bad agent", REPO, "x.rs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid agent"));
}

#[test]
fn history_for_unknown_agent_is_not_found() {
    let env = TestEnv::new();

    env.cmd()
        .args(["history", "agent-a"])
        .assert()
        .code(3);
}

#[test]
fn run_requires_agent_command_on_path() {
    let env = TestEnv::new();

    env.cmd()
        .env("AGENTCTL_AGENT_COMMAND", "agentctl-no-such-agent")
        .args(["run", "agent-a", "fix tests", "--attempts", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found in PATH"));
}

#[test]
fn run_exhausts_attempts_and_marks_agent_blocked() {
    let env = TestEnv::new();
    let workdir = TempDir::new().unwrap();

    // Not a git checkout, so every probe comes back unknown
    env.cmd()
        .env("AGENTCTL_AGENT_COMMAND", "true")
        .env("AGENTCTL_SETTLE_DELAY_MS", "0")
        .env("AGENTCTL_BACKOFF_MS", "0")
        .args(["run", "agent-a", "fix tests", "--attempts", "2", "--repo", REPO])
        .arg("--workdir")
        .arg(workdir.path())
        .assert()
        .code(5)
        .stderr(predicate::str::contains("not completed after 2 attempts"));

    env.cmd()
        .args(["bus", REPO, "--state"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status=blocked"));
}

#[test]
fn check_outside_a_checkout_is_a_storage_error() {
    let env = TestEnv::new();
    let workdir = TempDir::new().unwrap();

    env.cmd()
        .arg("check")
        .arg("--workdir")
        .arg(workdir.path())
        .assert()
        .code(2);
}
