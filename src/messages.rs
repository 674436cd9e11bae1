//! User-facing message texts

pub const NO_STAGED_FILES: &str = "No staged files found.";

pub const NO_TASKS: &str = "No staged files match any configured task.";

pub fn no_files_match(pattern: &str) -> String {
    format!("No staged files match {pattern}")
}

pub const SKIPPED_GIT_ERROR: &str = "Skipped because of previous git error.";

pub const SKIPPED_TASK_ERROR: &str = "Skipped because of errors from tasks.";

pub const SKIPPED_INTERRUPTED: &str = "Skipped because the run was cancelled.";

pub const SKIPPING_BACKUP: &str =
    "Skipping backup because `--no-stash` was used. This might result in data loss.";

pub const SKIPPING_BACKUP_DIFF: &str =
    "Skipping backup because `--diff` was used. This might result in data loss.";

pub const SKIPPING_BACKUP_NO_COMMIT: &str =
    "Skipping backup because there's no initial commit yet.";

pub const SKIPPING_HIDE_PARTIALLY_STAGED: &str =
    "Skipping hiding unstaged changes from partially staged files because `--no-hide-partially-staged` was used.";

pub const GIT_ADD_WARNING: &str = "Some of your tasks use `git add` command. Please remove it from the config since all modifications made by tasks will be automatically added to the git commit index.";

pub const PREVENTED_EMPTY_COMMIT: &str = "stagegate prevented an empty git commit.
  Use the --allow-empty option to continue, or check your task configuration";

pub const GIT_ERROR: &str = "stagegate failed due to a git error.";

pub const RESTORE_STASH_EXAMPLE: &str = "  Any lost modifications can be restored from a git stash:

    > git stash list
    stash@{0}: automatic stagegate backup
    > git stash apply --index stash@{0}
";

pub const CONFIG_NOT_FOUND: &str = "No valid configuration found.";

pub const INTERRUPTED: &str = "stagegate was interrupted.";

pub const TASK_FAILED: &str = "stagegate failed because some tasks failed.";

pub const FAILED_GET_STAGED_FILES: &str = "Failed to get staged files!";
