//! End-to-end runs against real git repositories

mod common;

use common::{run, TestRepo};
use stagegate::config::{CommandMap, CommandSpec};
use stagegate::messages;
use stagegate::ErrorKind;
use std::time::{Duration, Instant};

fn single(pattern: &str, command: &str) -> CommandMap {
    CommandMap::new().with(pattern, CommandSpec::literal(command))
}

#[tokio::test]
async fn test_formatter_fixes_are_committed() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const  x =   1\n").unwrap();
    let formatter = repo
        .script(
            "format.sh",
            r#"for f in "$@"; do printf 'const x = 1;\n' > "$f"; done"#,
        )
        .unwrap();

    let (result, output) = run(&repo.options(single("*.js", &formatter))).await;

    let summary = result.unwrap_or_else(|f| panic!("{f}\n{}", output.contents()));
    assert_eq!(summary.tasks.succeeded, 1);
    assert_eq!(repo.staged_content("test.js").unwrap(), "const x = 1;\n");
    assert_eq!(repo.read("test.js").unwrap(), "const x = 1;\n");
    assert_eq!(repo.stash_list().unwrap(), "");
}

#[tokio::test]
async fn test_failed_task_restores_original_state() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const  x =   1\n").unwrap();
    let broken = repo
        .script(
            "broken.sh",
            r#"for f in "$@"; do printf 'garbage\n' > "$f"; done
echo "test.js: parse error" >&2
exit 1"#,
        )
        .unwrap();

    let (result, output) = run(&repo.options(single("*.js", &broken))).await;

    let failure = result.unwrap_err();
    assert!(failure.context.has(ErrorKind::Task));
    assert_eq!(repo.staged_content("test.js").unwrap(), "const  x =   1\n");
    assert_eq!(repo.read("test.js").unwrap(), "const  x =   1\n");
    assert_eq!(repo.stash_list().unwrap(), "");

    let output = output.contents();
    assert!(output.contains("parse error"));
    assert!(output.contains(messages::TASK_FAILED));
}

#[tokio::test]
async fn test_empty_commit_is_prevented() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const x = 1;\n").unwrap();
    repo.commit("add test.js").unwrap();
    repo.stage("test.js", "const  x =   1\n").unwrap();
    let formatter = repo
        .script(
            "format.sh",
            r#"for f in "$@"; do printf 'const x = 1;\n' > "$f"; done"#,
        )
        .unwrap();

    let (result, output) = run(&repo.options(single("*.js", &formatter))).await;

    let failure = result.unwrap_err();
    assert!(failure.context.has(ErrorKind::ApplyEmptyCommit));
    assert!(output.contents().contains("prevented an empty git commit"));
    assert_eq!(repo.staged_content("test.js").unwrap(), "const  x =   1\n");
    assert_eq!(repo.read("test.js").unwrap(), "const  x =   1\n");
    assert_eq!(repo.stash_list().unwrap(), "");
}

#[tokio::test]
async fn test_allow_empty_keeps_formatted_file() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const x = 1;\n").unwrap();
    repo.commit("add test.js").unwrap();
    repo.stage("test.js", "const  x =   1\n").unwrap();
    let formatter = repo
        .script(
            "format.sh",
            r#"for f in "$@"; do printf 'const x = 1;\n' > "$f"; done"#,
        )
        .unwrap();
    let mut options = repo.options(single("*.js", &formatter));
    options.allow_empty = true;

    let (result, _) = run(&options).await;

    assert!(result.is_ok());
    assert_eq!(repo.staged_content("test.js").unwrap(), "const x = 1;\n");
}

#[tokio::test]
async fn test_index_lock_keeps_backup() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const x = 1;\n").unwrap();
    let lock = repo.git_dir().join("index.lock");
    let locker = repo
        .script("lock.sh", &format!("touch {}", lock.display()))
        .unwrap();

    let (result, output) = run(&repo.options(single("*.js", &locker))).await;

    let failure = result.unwrap_err();
    assert!(failure.context.has(ErrorKind::Git));
    let output = output.contents();
    assert!(output.contains("Another git process seems to be running"));
    assert!(output.contains(messages::GIT_ERROR));

    std::fs::remove_file(&lock).unwrap();
    assert!(repo
        .stash_list()
        .unwrap()
        .contains("automatic stagegate backup"));
}

#[tokio::test]
async fn test_no_matching_files_changes_nothing() {
    let repo = TestRepo::new().unwrap();
    repo.stage("notes.md", "# notes\n").unwrap();

    let (result, output) = run(&repo.options(single("*.js", "false"))).await;

    let summary = result.unwrap();
    assert_eq!(summary.message, Some(messages::NO_TASKS));
    assert!(output.contents().contains("No staged files match *.js"));
    assert_eq!(repo.staged_content("notes.md").unwrap(), "# notes\n");
    assert_eq!(repo.stash_list().unwrap(), "");
}

#[tokio::test]
async fn test_tasks_only_see_staged_content() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "line 1\n").unwrap();
    repo.commit("add test.js").unwrap();
    repo.stage("test.js", "line 1\nstaged\n").unwrap();
    repo.write("test.js", "line 1\nstaged\nunstaged\n").unwrap();

    let seen = repo.scratch("seen.txt");
    let spy = repo
        .script("spy.sh", &format!(r#"cat "$1" > {}"#, seen.display()))
        .unwrap();

    let (result, output) = run(&repo.options(single("*.js", &spy))).await;

    result.unwrap_or_else(|f| panic!("{f}\n{}", output.contents()));
    assert_eq!(std::fs::read_to_string(&seen).unwrap(), "line 1\nstaged\n");
    assert_eq!(repo.staged_content("test.js").unwrap(), "line 1\nstaged\n");
    assert_eq!(repo.read("test.js").unwrap(), "line 1\nstaged\nunstaged\n");
    assert_eq!(repo.stash_list().unwrap(), "");
}

#[tokio::test]
async fn test_unstaged_changes_return_on_top_of_task_fixes() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "a\nb\nc\nd\ne\nf\ng\n").unwrap();
    repo.commit("add test.js").unwrap();
    repo.stage("test.js", "a\nB\nc\nd\ne\nf\ng\n").unwrap();
    repo.write("test.js", "a\nB\nc\nd\ne\nf\nG\n").unwrap();

    let fixer = repo
        .script(
            "fix.sh",
            r#"for f in "$@"; do sed 's/^a$/A/' "$f" > "$f.fixed" && mv "$f.fixed" "$f"; done"#,
        )
        .unwrap();

    let (result, output) = run(&repo.options(single("*.js", &fixer))).await;

    result.unwrap_or_else(|f| panic!("{f}\n{}", output.contents()));
    assert_eq!(
        repo.staged_content("test.js").unwrap(),
        "A\nB\nc\nd\ne\nf\ng\n"
    );
    assert_eq!(repo.read("test.js").unwrap(), "A\nB\nc\nd\ne\nf\nG\n");
    assert_eq!(repo.stash_list().unwrap(), "");
}

#[tokio::test]
async fn test_failure_kills_long_running_sibling() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const x = 1;\n").unwrap();
    let slow = repo.script("slow.sh", "sleep 30").unwrap();
    let config = CommandMap::new()
        .with("*.js", CommandSpec::literal("false"))
        .with("*", CommandSpec::literal(slow));

    let started = Instant::now();
    let (result, _) = run(&repo.options(config)).await;

    let failure = result.unwrap_err();
    assert!(failure.context.has(ErrorKind::Task));
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(repo.staged_content("test.js").unwrap(), "const x = 1;\n");
}

#[tokio::test]
async fn test_without_backup_fixes_are_kept_on_failure() {
    let repo = TestRepo::new().unwrap();
    repo.stage("test.js", "const  x =   1\n").unwrap();
    let fix_then_fail = repo
        .script(
            "fix.sh",
            r#"for f in "$@"; do printf 'const x = 1;\n' > "$f"; done
exit 1"#,
        )
        .unwrap();
    let mut options = repo.options(single("*.js", &fix_then_fail));
    options.stash = Some(false);

    let (result, output) = run(&options).await;

    assert!(result.is_err());
    assert!(output.contents().contains(messages::SKIPPING_BACKUP));
    assert_eq!(repo.staged_content("test.js").unwrap(), "const x = 1;\n");
    assert_eq!(repo.stash_list().unwrap(), "");
}
