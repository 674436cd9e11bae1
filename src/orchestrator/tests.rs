use super::*;
use crate::config::{CommandMap, CommandSpec, Concurrency};
use crate::error::ErrorKind;
use crate::git::StagingTransaction;
use crate::subprocess::MockProcessRunner;
use crate::tasks::{Invocation, Task};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Records the steps it is driven through and fails the configured ones
#[derive(Default)]
struct FakeTransaction {
    calls: Vec<&'static str>,
    failures: Vec<(&'static str, u16)>,
    partially_staged: bool,
}

impl FakeTransaction {
    fn failing(step: &'static str, code: u16) -> Self {
        Self {
            failures: vec![(step, code)],
            ..Default::default()
        }
    }

    fn step(&mut self, step: &'static str, ctx: &mut ExecutionContext) -> Result<()> {
        self.calls.push(step);
        match self.failures.iter().find(|(name, _)| *name == step) {
            Some((_, code)) => {
                let err = StageGateError::git(*code, format!("{step} failed"), step);
                ctx.record(&err);
                ctx.add_error(ErrorKind::Git);
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StagingTransaction for FakeTransaction {
    async fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        ctx.has_partially_staged_files = self.partially_staged;
        self.step("prepare", ctx)
    }

    async fn hide_unstaged_changes(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.step("hide", ctx)
    }

    fn tasks_finished(&mut self) {
        self.calls.push("tasks_finished");
    }

    async fn apply_modifications(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.step("apply", ctx)
    }

    async fn restore_unstaged_changes(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.step("restore_unstaged", ctx)
    }

    async fn restore_original_state(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.step("restore_original", ctx)
    }

    async fn cleanup(&mut self, ctx: &mut ExecutionContext, drop_backup: bool) -> Result<()> {
        self.step(if drop_backup { "cleanup:drop" } else { "cleanup:keep" }, ctx)
    }
}

fn groups(program: &str) -> Vec<GroupRun> {
    vec![GroupRun {
        title: ".stagegaterc".to_string(),
        patterns: vec![PatternRun {
            title: "*.js: 1 file(s)".to_string(),
            tasks: vec![Task {
                title: program.to_string(),
                command: program.to_string(),
                invocations: vec![Invocation {
                    program: program.to_string(),
                    args: Vec::new(),
                    files: vec!["/repo/a.js".to_string()],
                    cwd: PathBuf::from("/repo"),
                }],
                should_be_provided_paths: true,
                cwd: PathBuf::from("/repo"),
            }],
        }],
    }]
}

fn scheduler(mock: &MockProcessRunner) -> TaskScheduler {
    TaskScheduler::new(Arc::new(mock.clone()), Concurrency::Limit(2), false)
}

async fn drive(
    tx: &mut FakeTransaction,
    mock: &MockProcessRunner,
    should_backup: bool,
) -> (ExecutionContext, PhaseReport, String) {
    let (reporter, buffer) = Reporter::buffered(false);
    let mut ctx = ExecutionContext::new(should_backup, false);
    let report = run_phases(tx, &scheduler(mock), &groups("eslint"), &mut ctx, &reporter).await;
    (ctx, report, buffer.contents())
}

fn passing() -> MockProcessRunner {
    let mock = MockProcessRunner::new();
    mock.expect_command("eslint").finish();
    mock
}

fn failing() -> MockProcessRunner {
    let mock = MockProcessRunner::new();
    mock.expect_command("eslint")
        .returns_exit_code(1)
        .returns_stderr("a.js: 'x' is not defined")
        .finish();
    mock
}

#[tokio::test]
async fn test_successful_run_drops_backup() {
    let mut tx = FakeTransaction::default();

    let (ctx, report, output) = drive(&mut tx, &passing(), true).await;

    assert!(!ctx.has_errors());
    assert_eq!(report.tasks.succeeded, 1);
    assert_eq!(tx.calls, vec!["prepare", "tasks_finished", "apply", "cleanup:drop"]);
    assert!(output.contains("[COMPLETED] Applying modifications from tasks..."));
}

#[tokio::test]
async fn test_partially_staged_files_are_hidden_and_restored() {
    let mut tx = FakeTransaction {
        partially_staged: true,
        ..Default::default()
    };

    let (ctx, _, _) = drive(&mut tx, &passing(), true).await;

    assert!(!ctx.has_errors());
    assert_eq!(
        tx.calls,
        vec![
            "prepare",
            "hide",
            "tasks_finished",
            "apply",
            "restore_unstaged",
            "cleanup:drop"
        ]
    );
}

#[tokio::test]
async fn test_task_failure_restores_from_backup() {
    let mut tx = FakeTransaction {
        partially_staged: true,
        ..Default::default()
    };

    let (ctx, report, output) = drive(&mut tx, &failing(), true).await;

    assert!(ctx.has(ErrorKind::Task));
    assert_eq!(report.tasks.failed, 1);
    assert_eq!(
        tx.calls,
        vec!["prepare", "hide", "tasks_finished", "restore_original", "cleanup:drop"]
    );
    assert!(output.contains(
        "[SKIPPED] Applying modifications from tasks...: Skipped because of errors from tasks."
    ));
    assert!(ctx.output[0].contains("'x' is not defined"));
}

#[tokio::test]
async fn test_task_failure_without_backup_keeps_modifications() {
    let mut tx = FakeTransaction::default();

    let (ctx, _, _) = drive(&mut tx, &failing(), false).await;

    assert!(ctx.has(ErrorKind::Task));
    assert_eq!(tx.calls, vec!["prepare", "tasks_finished", "apply", "cleanup:keep"]);
}

#[tokio::test]
async fn test_empty_commit_restores_original_state() {
    let mut tx = FakeTransaction::failing("apply", ErrorCode::GIT_EMPTY_COMMIT);

    let (ctx, report, _) = drive(&mut tx, &passing(), true).await;

    assert!(ctx.has(ErrorKind::ApplyEmptyCommit));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        tx.calls,
        vec!["prepare", "tasks_finished", "apply", "restore_original", "cleanup:drop"]
    );
}

#[tokio::test]
async fn test_prepare_failure_runs_nothing_and_keeps_backup() {
    let mut tx = FakeTransaction::failing("prepare", ErrorCode::GIT_REPO_LOCKED);
    let mock = passing();

    let (ctx, report, output) = drive(&mut tx, &mock, true).await;

    assert!(ctx.has(ErrorKind::Git));
    assert_eq!(tx.calls, vec!["prepare", "cleanup:keep"]);
    assert!(mock.get_call_history().is_empty());
    assert_eq!(report.errors[0].code(), ErrorCode::GIT_REPO_LOCKED);
    assert!(output.contains("[FAILED] Preparing stagegate..."));
}

#[tokio::test]
async fn test_hide_failure_skips_tasks_and_keeps_backup() {
    let mut tx = FakeTransaction {
        partially_staged: true,
        ..FakeTransaction::failing("hide", ErrorCode::GIT_HIDE_UNSTAGED)
    };
    let mock = passing();

    let (ctx, _, output) = drive(&mut tx, &mock, true).await;

    assert!(ctx.has(ErrorKind::HideUnstagedChanges));
    assert!(mock.get_call_history().is_empty());
    assert_eq!(tx.calls, vec!["prepare", "hide", "tasks_finished", "cleanup:keep"]);
    assert!(output.contains(
        "[SKIPPED] Running tasks for staged files...: Skipped because of previous git error."
    ));
}

#[tokio::test]
async fn test_failed_restore_keeps_backup() {
    let mut tx = FakeTransaction::failing("restore_original", ErrorCode::GIT_RESTORE_ORIGINAL);

    let (ctx, report, output) = drive(&mut tx, &failing(), true).await;

    assert!(ctx.has(ErrorKind::RestoreOriginalState));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        tx.calls,
        vec!["prepare", "tasks_finished", "restore_original", "cleanup:keep"]
    );
    assert!(output.contains("[SKIPPED] Cleaning up temporary files...: Skipped because of previous git error."));
}

fn git_mock(top_level: &str, staged: &str) -> (SubprocessManager, MockProcessRunner) {
    let (manager, mock) = SubprocessManager::mock();
    mock.expect_command("git")
        .with_args(|args| args.contains(&"rev-parse".to_string()))
        .returns_stdout(&format!("{top_level}\n{top_level}/.git\n"))
        .finish();
    mock.expect_command("git")
        .with_args(|args| args.contains(&"log".to_string()))
        .returns_stdout("commit abc\n")
        .finish();
    mock.expect_command("git")
        .with_args(|args| args.contains(&"--name-status".to_string()))
        .returns_stdout(staged)
        .finish();
    (manager, mock)
}

fn touched_repository(mock: &MockProcessRunner) -> bool {
    mock.get_call_history().iter().any(|call| {
        call.args
            .iter()
            .any(|arg| arg == "stash" || arg == "add" || arg == "checkout")
    })
}

#[tokio::test]
async fn test_invalid_options_fail_before_git() {
    let (manager, mock) = SubprocessManager::mock();
    let (reporter, buffer) = Reporter::buffered(false);
    let options = Options {
        all: true,
        diff: Some("HEAD~1".to_string()),
        ..Default::default()
    };

    let failure = run_all(&options, &manager, &reporter).await.unwrap_err();

    assert!(failure.context.has(ErrorKind::InvalidOptions));
    assert!(mock.get_call_history().is_empty());

    report_failure(&failure, &reporter);
    assert!(buffer.contents().contains("--all conflicts with --diff"));
}

#[tokio::test]
async fn test_outside_repository() {
    let dir = TempDir::new().unwrap();
    let (manager, mock) = SubprocessManager::mock();
    mock.expect_command("git")
        .returns_exit_code(128)
        .returns_stderr("fatal: not a git repository (or any of the parent directories): .git")
        .finish();
    let (reporter, buffer) = Reporter::buffered(false);
    let options = Options {
        cwd: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let failure = run_all(&options, &manager, &reporter).await.unwrap_err();
    report_failure(&failure, &reporter);

    assert!(failure.context.has(ErrorKind::Git));
    assert!(buffer
        .contents()
        .contains("Current directory is not a git directory!"));
}

#[tokio::test]
async fn test_no_staged_files_is_success() {
    let dir = TempDir::new().unwrap();
    let (manager, mock) = git_mock("/repo", "");
    let (reporter, _buffer) = Reporter::buffered(false);
    let options = Options {
        cwd: Some(dir.path().to_path_buf()),
        config: Some(CommandMap::new().with("*.js", CommandSpec::literal("eslint"))),
        ..Default::default()
    };

    let summary = run_all(&options, &manager, &reporter).await.unwrap();

    assert_eq!(summary.message, Some(messages::NO_STAGED_FILES));
    assert!(!touched_repository(&mock));
}

#[tokio::test]
async fn test_no_matching_files_is_success() {
    let dir = TempDir::new().unwrap();
    let (manager, mock) = git_mock("/repo", "M\0README.md\0");
    let (reporter, buffer) = Reporter::buffered(false);
    let options = Options {
        cwd: Some(dir.path().to_path_buf()),
        config: Some(CommandMap::new().with("*.js", CommandSpec::literal("eslint"))),
        ..Default::default()
    };

    let summary = run_all(&options, &manager, &reporter).await.unwrap();

    assert_eq!(summary.message, Some(messages::NO_TASKS));
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].title, "*.js");
    assert!(buffer.contents().contains("No staged files match *.js"));
    assert!(!touched_repository(&mock));
    assert!(!mock.verify_called("eslint", 1));
}

#[tokio::test]
async fn test_invalid_function_task_leaves_repository_untouched() {
    let dir = TempDir::new().unwrap();
    let top_level = dir.path().to_string_lossy().into_owned();
    let (manager, mock) = git_mock(&top_level, "M\0a.js\0");
    let (reporter, _buffer) = Reporter::buffered(false);
    let options = Options {
        cwd: Some(dir.path().to_path_buf()),
        config: Some(CommandMap::new().with(
            "*.js",
            CommandSpec::dynamic(|_files| Ok(serde_json::json!({ "not": "a command" }))),
        )),
        ..Default::default()
    };

    let failure = run_all(&options, &manager, &reporter).await.unwrap_err();

    assert!(failure.context.has(ErrorKind::Validation));
    assert_eq!(failure.errors[0].code(), ErrorCode::VALIDATION_FUNCTION_TASK);
    assert!(!touched_repository(&mock));
}

#[tokio::test]
async fn test_missing_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let (manager, mock) = git_mock("/repo", "M\0a.js\0");
    mock.expect_command("git")
        .with_args(|args| args.contains(&"ls-files".to_string()))
        .returns_stdout("")
        .finish();
    let (reporter, buffer) = Reporter::buffered(false);
    let options = Options {
        cwd: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let failure = run_all(&options, &manager, &reporter).await.unwrap_err();
    report_failure(&failure, &reporter);

    assert!(failure.context.has(ErrorKind::ConfigNotFound));
    assert!(buffer.contents().contains(messages::CONFIG_NOT_FOUND));
    assert!(!touched_repository(&mock));
}

#[test]
fn test_backup_warnings() {
    let diff = Options {
        diff: Some("main...HEAD".to_string()),
        ..Default::default()
    };
    assert_eq!(backup_warning(&diff, true), Some(messages::SKIPPING_BACKUP_DIFF));

    let no_stash = Options {
        stash: Some(false),
        ..Default::default()
    };
    assert_eq!(backup_warning(&no_stash, true), Some(messages::SKIPPING_BACKUP));

    assert_eq!(
        backup_warning(&Options::default(), false),
        Some(messages::SKIPPING_BACKUP_NO_COMMIT)
    );
    assert_eq!(backup_warning(&Options::default(), true), None);

    let all = Options {
        all: true,
        ..Default::default()
    };
    assert_eq!(backup_warning(&all, true), None);
}
