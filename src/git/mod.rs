//! Git plumbing used by a run
//!
//! Every git invocation goes through [`GitClient`], which pins
//! `submodule.recurse=false` and classifies failures into [`GitError`].
//! The staging transaction itself lives in [`workflow`].

pub mod error;
pub mod parsers;
pub mod staged;
pub mod workflow;

pub use error::GitError;
pub use staged::{get_staged_files, FileStatus, StagedFile, StagedFilesQuery};
pub use workflow::{
    BackupHandle, GitWorkflow, StagingTransaction, WorkflowOptions, WorkflowState, BACKUP_MESSAGE,
};

use crate::subprocess::{ProcessCommandBuilder, ProcessOutput, ProcessRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments prepended to every git call
const GIT_GLOBAL_ARGS: [&str; 2] = ["-c", "submodule.recurse=false"];

/// Location of the repository being committed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    pub top_level: PathBuf,
    pub git_dir: PathBuf,
}

/// Thin wrapper that runs git through a [`ProcessRunner`]
#[derive(Clone)]
pub struct GitClient {
    runner: Arc<dyn ProcessRunner>,
    cwd: PathBuf,
}

impl GitClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, cwd: &Path) -> Self {
        Self {
            runner,
            cwd: cwd.to_path_buf(),
        }
    }

    /// Same runner, different working directory
    pub fn in_dir(&self, cwd: &Path) -> Self {
        Self::new(Arc::clone(&self.runner), cwd)
    }

    /// Run git and return the raw output, whatever the exit status
    pub async fn output<I, S>(&self, args: I) -> Result<ProcessOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = ProcessCommandBuilder::new("git")
            .args(GIT_GLOBAL_ARGS)
            .args(args)
            .current_dir(&self.cwd)
            .build();

        tracing::trace!("Running {} in {}", command.display(), self.cwd.display());
        Ok(self.runner.run(command).await?)
    }

    /// Run git and return stdout, mapping a non-zero exit to [`GitError`]
    pub async fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let output = self.output(&args).await?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let err = GitError::from_failure(&args.join(" "), &output.stderr, output.status.code());
            tracing::debug!("git {} failed: {}", args.join(" "), err);
            Err(err)
        }
    }

    /// Resolve the repository top-level and absolute git directory
    pub async fn resolve_paths(&self) -> Result<RepoPaths, GitError> {
        let stdout = self
            .run(["rev-parse", "--show-toplevel", "--absolute-git-dir"])
            .await
            .map_err(|e| match e {
                GitError::CommandFailed { .. } => GitError::NotARepository,
                other => other,
            })?;

        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next()) {
            (Some(top_level), Some(git_dir)) => Ok(RepoPaths {
                top_level: PathBuf::from(top_level),
                git_dir: PathBuf::from(git_dir),
            }),
            _ => Err(GitError::NotARepository),
        }
    }

    /// Whether HEAD points at a commit
    pub async fn has_initial_commit(&self) -> bool {
        self.run(["log", "-1"]).await.is_ok()
    }
}
