//! Git operation error types

use crate::error::ErrorCode;
use crate::subprocess::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Git-specific errors
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Current directory is not a git directory!")]
    NotARepository,

    #[error(
        "Another git process seems to be running in this repository, e.g. an editor opened by 'git commit'. \
         Please make sure all processes are terminated then try again. \
         If it still fails, a git process may have crashed in this repository earlier. \
         Remove the index.lock file manually to continue."
    )]
    RepositoryLocked,

    #[error("git {command} failed: {stderr}")]
    CommandFailed {
        command: String,
        stderr: String,
        code: Option<i32>,
    },

    #[error("Failed to run git: {0}")]
    Process(#[from] ProcessError),

    #[error("stagegate automatic backup is missing!")]
    BackupMissing,

    #[error("Unstaged changes could not be restored due to a merge conflict!")]
    UnstagedRestoreConflict,

    #[error("Prevented an empty git commit!")]
    EmptyCommit,

    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GitError {
    /// Classify a failed git invocation, spotting index lock contention
    pub fn from_failure(command: &str, stderr: &str, code: Option<i32>) -> Self {
        if stderr.contains("index.lock") {
            return GitError::RepositoryLocked;
        }
        if stderr.contains("not a git repository") {
            return GitError::NotARepository;
        }
        GitError::CommandFailed {
            command: command.to_string(),
            stderr: stderr.trim().to_string(),
            code,
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GitError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            GitError::NotARepository => ErrorCode::GIT_REPO_NOT_FOUND,
            GitError::RepositoryLocked => ErrorCode::GIT_REPO_LOCKED,
            GitError::CommandFailed { .. } | GitError::Process(_) => ErrorCode::GIT_COMMAND_FAILED,
            GitError::BackupMissing => ErrorCode::GIT_BACKUP_MISSING,
            GitError::UnstagedRestoreConflict => ErrorCode::GIT_RESTORE_UNSTAGED,
            GitError::EmptyCommit => ErrorCode::GIT_EMPTY_COMMIT,
            GitError::Io { .. } => ErrorCode::GIT_GENERIC,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            GitError::NotARepository => "repository check",
            GitError::RepositoryLocked => "repository access",
            GitError::CommandFailed { .. } | GitError::Process(_) => "command execution",
            GitError::BackupMissing => "backup lookup",
            GitError::UnstagedRestoreConflict => "restore unstaged changes",
            GitError::EmptyCommit => "apply modifications",
            GitError::Io { .. } => "file access",
        }
    }
}
