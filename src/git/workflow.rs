//! The staging transaction.
//!
//! [`GitWorkflow`] isolates the staged content of partially staged files,
//! keeps exactly one backup stash per run, adds task modifications back to
//! the index and rolls everything back from that backup when the run fails.
//!
//! Every method records the error kinds of its failure in the
//! [`ExecutionContext`] before returning the error, so the phase rules in
//! [`crate::state`] can decide what runs next.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::parsers::{find_stash_index, parse_partially_staged, split_nul, stash_ref};
use super::staged::{normalize_path, StagedFilesQuery};
use super::{GitClient, GitError, RepoPaths};
use crate::context::ExecutionContext;
use crate::error::{ErrorKind, Result, StageGateError};
use crate::tasks::chunk::chunk_files;

/// Message identifying the backup stash
pub const BACKUP_MESSAGE: &str = "automatic stagegate backup";

const PATCH_UNSTAGED: &str = "stagegate_unstaged.patch";
const MERGE_HEAD: &str = "MERGE_HEAD";
const MERGE_MODE: &str = "MERGE_MODE";
const MERGE_MSG: &str = "MERGE_MSG";

const GIT_DIFF_ARGS: [&str; 8] = [
    "--binary",
    "--unified=0",
    "--no-color",
    "--no-ext-diff",
    "--src-prefix=a/",
    "--dst-prefix=b/",
    "--patch",
    "--submodule=short",
];
const GIT_APPLY_ARGS: [&str; 4] = ["-v", "--whitespace=nowarn", "--recount", "--unidiff-zero"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Prepared,
    UnstagedHidden,
    TasksRan,
    ModificationsApplied,
    Cleaned,
    RolledBack,
}

/// The single recovery point of a run, located by its stash message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub message: String,
}

/// Contents of the merge metadata files, if a merge was in progress
#[derive(Debug, Default, Clone)]
struct MergeStatus {
    head: Option<Vec<u8>>,
    mode: Option<Vec<u8>>,
    msg: Option<Vec<u8>>,
}

/// Steps of the transaction, in the order the orchestrator drives them
#[async_trait]
pub trait StagingTransaction: Send {
    async fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    async fn hide_unstaged_changes(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    /// Mark the end of the task phase
    fn tasks_finished(&mut self);

    async fn apply_modifications(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    async fn restore_unstaged_changes(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    async fn restore_original_state(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    /// Drop the backup when `drop_backup` is set and remove scratch files.
    /// Calling it again is a no-op.
    async fn cleanup(&mut self, ctx: &mut ExecutionContext, drop_backup: bool) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub allow_empty: bool,
    pub query: StagedFilesQuery,
    /// Absolute paths of every file matched by some task
    pub matched_files: Vec<String>,
    pub max_arg_length: usize,
}

pub struct GitWorkflow {
    git: GitClient,
    paths: RepoPaths,
    options: WorkflowOptions,
    partially_staged: Vec<String>,
    deleted_files: Vec<PathBuf>,
    merge_status: MergeStatus,
    backup: Option<BackupHandle>,
    state: WorkflowState,
}

impl GitWorkflow {
    pub fn new(git: &GitClient, paths: RepoPaths, options: WorkflowOptions) -> Self {
        Self {
            git: git.in_dir(&paths.top_level),
            paths,
            options,
            partially_staged: Vec::new(),
            deleted_files: Vec::new(),
            merge_status: MergeStatus::default(),
            backup: None,
            state: WorkflowState::Init,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn backup(&self) -> Option<&BackupHandle> {
        self.backup.as_ref()
    }

    /// Files with both staged and unstaged changes, relative to the top level
    pub fn partially_staged_files(&self) -> &[String] {
        &self.partially_staged
    }

    fn hidden_path(&self, name: &str) -> PathBuf {
        self.paths.git_dir.join(name)
    }

    /// Record the failure in the context and convert it
    fn handle_error(
        ctx: &mut ExecutionContext,
        error: GitError,
        phase: Option<ErrorKind>,
    ) -> StageGateError {
        tracing::debug!("Git workflow step failed: {}", error);
        let error = StageGateError::from(error);
        ctx.record(&error);
        ctx.add_error(ErrorKind::Git);
        if let Some(kind) = phase {
            ctx.add_error(kind);
        }
        error
    }

    fn ensure_unlocked(&self) -> std::result::Result<(), GitError> {
        if self.paths.git_dir.join("index.lock").exists() {
            return Err(GitError::RepositoryLocked);
        }
        Ok(())
    }

    async fn find_backup_ref(&self, ctx: &mut ExecutionContext) -> std::result::Result<String, GitError> {
        let message = self
            .backup
            .as_ref()
            .map(|b| b.message.as_str())
            .unwrap_or(BACKUP_MESSAGE);
        let stashes = self.git.run(["stash", "list"]).await?;

        match find_stash_index(&stashes, message) {
            Some(index) => Ok(stash_ref(index)),
            None => {
                ctx.add_error(ErrorKind::GetBackupStash);
                Err(GitError::BackupMissing)
            }
        }
    }

    async fn read_optional(path: &Path) -> std::result::Result<Option<Vec<u8>>, GitError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GitError::io("read", path, e)),
        }
    }

    async fn remove_if_exists(path: &Path) -> std::result::Result<(), GitError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GitError::io("remove", path, e)),
        }
    }

    async fn backup_merge_status(&mut self) -> std::result::Result<(), GitError> {
        self.merge_status = MergeStatus {
            head: Self::read_optional(&self.hidden_path(MERGE_HEAD)).await?,
            mode: Self::read_optional(&self.hidden_path(MERGE_MODE)).await?,
            msg: Self::read_optional(&self.hidden_path(MERGE_MSG)).await?,
        };
        if self.merge_status.head.is_some() {
            tracing::debug!("Backed up merge status");
        }
        Ok(())
    }

    async fn restore_merge_status(&self, ctx: &mut ExecutionContext) -> std::result::Result<(), GitError> {
        let files = [
            (MERGE_HEAD, &self.merge_status.head),
            (MERGE_MODE, &self.merge_status.mode),
            (MERGE_MSG, &self.merge_status.msg),
        ];
        for (name, contents) in files {
            if let Some(contents) = contents {
                let path = self.hidden_path(name);
                if let Err(e) = tokio::fs::write(&path, contents).await {
                    ctx.add_error(ErrorKind::RestoreMergeStatus);
                    return Err(GitError::io("restore", path, e));
                }
            }
        }
        Ok(())
    }

    async fn remove_deleted_files(&self) -> std::result::Result<(), GitError> {
        for file in &self.deleted_files {
            Self::remove_if_exists(file).await?;
        }
        Ok(())
    }

    async fn list_deleted_files(&self) -> std::result::Result<Vec<PathBuf>, GitError> {
        let stdout = self.git.run(["ls-files", "-z", "--deleted"]).await?;
        Ok(split_nul(&stdout)
            .into_iter()
            .map(|path| self.paths.top_level.join(path))
            .collect())
    }

    async fn try_prepare(&mut self, ctx: &mut ExecutionContext) -> std::result::Result<(), GitError> {
        self.ensure_unlocked()?;

        let status = self.git.run(["status", "-z"]).await?;
        self.partially_staged = parse_partially_staged(&status);
        ctx.has_partially_staged_files = !self.partially_staged.is_empty();

        if ctx.has_partially_staged_files {
            tracing::debug!(
                "Found {} partially staged file(s): {:?}",
                self.partially_staged.len(),
                self.partially_staged
            );
            let patch = normalize_path(&self.hidden_path(PATCH_UNSTAGED));
            let mut args: Vec<String> = vec!["diff".to_string()];
            args.extend(GIT_DIFF_ARGS.iter().map(|a| a.to_string()));
            args.extend(["--output".to_string(), patch, "--".to_string()]);
            args.extend(self.partially_staged.iter().cloned());
            self.git.run(&args).await?;
        }

        if !ctx.should_backup {
            return Ok(());
        }

        tracing::debug!("Backing up original state...");
        self.backup_merge_status().await?;
        self.deleted_files = self.list_deleted_files().await?;

        // `stash create` leaves the working tree alone; `stash store` makes it a real stash
        let hash = self.git.run(["stash", "create"]).await?;
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(GitError::CommandFailed {
                command: "stash create".to_string(),
                stderr: "no local changes to back up".to_string(),
                code: None,
            });
        }
        self.git
            .run(["stash", "store", "--quiet", "--message", BACKUP_MESSAGE, hash])
            .await?;
        self.backup = Some(BackupHandle {
            message: BACKUP_MESSAGE.to_string(),
        });

        self.restore_merge_status(ctx).await?;
        self.remove_deleted_files().await?;
        tracing::debug!("Done backing up original state!");
        Ok(())
    }

    async fn try_apply_modifications(&self) -> std::result::Result<(), GitError> {
        let existing: Vec<String> = self
            .options
            .matched_files
            .iter()
            .filter(|file| Path::new(file.as_str()).exists())
            .cloned()
            .collect();

        // git add takes the index lock, so chunks run one after another
        let base = "git -c submodule.recurse=false add --".len();
        for chunk in chunk_files(&existing, self.options.max_arg_length, base) {
            let mut args = vec!["add".to_string(), "--".to_string()];
            args.extend(chunk);
            self.git.run(&args).await?;
        }

        let mut args = vec!["diff".to_string(), "--name-only".to_string(), "-z".to_string()];
        args.extend(self.options.query.diff_args());
        let staged = self.git.run(&args).await?;

        if staged.trim_matches('\0').trim().is_empty() && !self.options.allow_empty {
            return Err(GitError::EmptyCommit);
        }
        Ok(())
    }

    async fn try_restore_original_state(
        &mut self,
        ctx: &mut ExecutionContext,
    ) -> std::result::Result<(), GitError> {
        self.git.run(["reset", "--hard", "HEAD"]).await?;
        let backup = self.find_backup_ref(ctx).await?;
        self.git
            .run(["stash", "apply", "--quiet", "--index", backup.as_str()])
            .await?;
        self.restore_merge_status(ctx).await?;
        self.remove_deleted_files().await?;
        Self::remove_if_exists(&self.hidden_path(PATCH_UNSTAGED)).await
    }
}

#[async_trait]
impl StagingTransaction for GitWorkflow {
    async fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let result = self.try_prepare(ctx).await;
        self.state = WorkflowState::Prepared;
        result.map_err(|e| Self::handle_error(ctx, e, None))
    }

    async fn hide_unstaged_changes(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        if self.partially_staged.is_empty() {
            return Ok(());
        }

        let mut args = vec!["checkout".to_string(), "--force".to_string(), "--".to_string()];
        args.extend(self.partially_staged.iter().cloned());
        self.git
            .run(&args)
            .await
            .map_err(|e| Self::handle_error(ctx, e, Some(ErrorKind::HideUnstagedChanges)))?;

        self.state = WorkflowState::UnstagedHidden;
        Ok(())
    }

    fn tasks_finished(&mut self) {
        self.state = WorkflowState::TasksRan;
    }

    async fn apply_modifications(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        tracing::debug!("Adding task modifications to index...");
        match self.try_apply_modifications().await {
            Ok(()) => {
                self.state = WorkflowState::ModificationsApplied;
                tracing::debug!("Done adding task modifications to index!");
                Ok(())
            }
            Err(GitError::EmptyCommit) => Err(Self::handle_error(
                ctx,
                GitError::EmptyCommit,
                Some(ErrorKind::ApplyEmptyCommit),
            )),
            Err(e) => Err(Self::handle_error(ctx, e, None)),
        }
    }

    async fn restore_unstaged_changes(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let patch = normalize_path(&self.hidden_path(PATCH_UNSTAGED));
        let mut args: Vec<String> = vec!["apply".to_string()];
        args.extend(GIT_APPLY_ARGS.iter().map(|a| a.to_string()));

        let mut direct = args.clone();
        direct.push(patch.clone());
        if let Err(e) = self.git.run(&direct).await {
            tracing::debug!("Applying unstaged patch failed, retrying with --3way: {}", e);
            let mut three_way = args;
            three_way.extend(["--3way".to_string(), patch]);
            if let Err(e) = self.git.run(&three_way).await {
                tracing::debug!("Three-way apply failed: {}", e);
                return Err(Self::handle_error(
                    ctx,
                    GitError::UnstagedRestoreConflict,
                    Some(ErrorKind::RestoreUnstagedChanges),
                ));
            }
        }
        Ok(())
    }

    async fn restore_original_state(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        tracing::debug!("Restoring original state...");
        let result = self.try_restore_original_state(ctx).await;
        match result {
            Ok(()) => {
                self.state = WorkflowState::RolledBack;
                tracing::debug!("Done restoring original state!");
                Ok(())
            }
            Err(e) => Err(Self::handle_error(
                ctx,
                e,
                Some(ErrorKind::RestoreOriginalState),
            )),
        }
    }

    async fn cleanup(&mut self, ctx: &mut ExecutionContext, drop_backup: bool) -> Result<()> {
        if self.state == WorkflowState::Cleaned {
            return Ok(());
        }

        let patch_removed = Self::remove_if_exists(&self.hidden_path(PATCH_UNSTAGED)).await;

        if drop_backup && self.backup.is_some() {
            tracing::debug!("Dropping backup stash...");
            let backup = self
                .find_backup_ref(ctx)
                .await
                .map_err(|e| Self::handle_error(ctx, e, None))?;
            self.git
                .run(["stash", "drop", "--quiet", backup.as_str()])
                .await
                .map_err(|e| Self::handle_error(ctx, e, None))?;
            self.backup = None;
        }

        patch_removed.map_err(|e| Self::handle_error(ctx, e, None))?;
        self.state = WorkflowState::Cleaned;
        Ok(())
    }
}
