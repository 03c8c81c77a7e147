//! Prompt text handed to the executor on each attempt.

use super::capabilities::ProbeReport;

/// Appended to the task when another agent asked for a rebase.
pub const REBASE_NOTE: &str =
    "IMPORTANT: Another agent has pushed changes. Run 'git pull --rebase' before continuing.";

/// Build the prompt for one attempt.
///
/// The first attempt (or any attempt without a previous report) gets the raw
/// task. Later attempts get a recap of the previous status followed by the
/// original task. The rebase note is attached to this attempt's task only.
pub fn build_prompt(task: &str, previous: Option<&ProbeReport>, rebase_needed: bool) -> String {
    let task = if rebase_needed {
        format!("{task}\n\n{REBASE_NOTE}")
    } else {
        task.to_string()
    };

    match previous {
        None => task,
        Some(report) => format!(
            "Continue working. Previous status:\n\
             - Tests: {}\n\
             - Uncommitted changes: {}\n\n\
             Original task: {task}\n\n\
             Keep going until tests pass and all changes are committed.",
            report.test_status, report.has_uncommitted_changes
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::TestStatus;

    #[test]
    fn test_first_attempt_uses_raw_task() {
        assert_eq!(build_prompt("fix tests", None, false), "fix tests");
    }

    #[test]
    fn test_rebase_note_is_appended() {
        let prompt = build_prompt("fix tests", None, true);
        assert!(prompt.starts_with("fix tests\n\n"));
        assert!(prompt.ends_with(REBASE_NOTE));
    }

    #[test]
    fn test_continuation_recaps_previous_status() {
        let previous = ProbeReport {
            test_status: TestStatus::Fail,
            has_uncommitted_changes: true,
            executor_running: false,
        };

        let prompt = build_prompt("fix tests", Some(&previous), false);

        assert_eq!(
            prompt,
            "Continue working. Previous status:\n- Tests: fail\n- Uncommitted changes: true\n\n\
             Original task: fix tests\n\n\
             Keep going until tests pass and all changes are committed."
        );
    }

    #[test]
    fn test_continuation_carries_rebase_note_in_task() {
        let prompt = build_prompt("fix tests", Some(&ProbeReport::unknown()), true);
        assert!(prompt.contains(&format!("Original task: fix tests\n\n{REBASE_NOTE}")));
        assert_eq!(prompt.matches(REBASE_NOTE).count(), 1);
    }
}
