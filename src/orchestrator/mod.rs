//! Entry points of a run
//!
//! [`run_all`] resolves files and configuration, builds every task before
//! touching the repository, and then hands over to [`phases::run_phases`].
//! [`run`] wraps it with production subprocesses and prints the outcome.

pub mod phases;

#[cfg(test)]
mod tests;

pub use phases::{run_phases, PhaseReport};

use std::fmt;
use std::path::Path;

use crate::config::{group_files, search_configs, Options};
use crate::context::{ExecutionContext, Skip};
use crate::error::{describe_error_code, ErrorCode, ErrorKind, Result, StageGateError};
use crate::git::{
    get_staged_files, GitClient, GitWorkflow, RepoPaths, StagedFilesQuery, WorkflowOptions,
};
use crate::matching::{match_files, relative_path};
use crate::messages;
use crate::report::Reporter;
use crate::subprocess::SubprocessManager;
use crate::tasks::{
    build_tasks, default_max_arg_length, GroupRun, PatternRun, TaskOptions, TaskScheduler,
    TaskSummary,
};

/// Result of a successful run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub tasks: TaskSummary,
    pub skipped: Vec<Skip>,
    /// Task output collected in verbose mode
    pub output: Vec<String>,
    /// Why nothing ran, when nothing did
    pub message: Option<&'static str>,
}

/// A failed run, with the context describing what went wrong
#[derive(Debug)]
pub struct RunFailure {
    pub context: ExecutionContext,
    pub errors: Vec<StageGateError>,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self.context.errors.iter().map(|k| k.to_string()).collect();
        write!(f, "stagegate failed: {}", kinds.join(", "))
    }
}

impl std::error::Error for RunFailure {}

impl RunFailure {
    fn new(mut context: ExecutionContext, error: StageGateError) -> Self {
        context.record(&error);
        Self {
            context,
            errors: vec![error],
        }
    }
}

struct RunPlan {
    paths: RepoPaths,
    groups: Vec<GroupRun>,
    matched_files: Vec<String>,
    should_backup: bool,
}

enum Plan {
    /// Nothing to do; the message says why
    Finished(&'static str),
    Run(RunPlan),
}

fn backup_warning(options: &Options, has_initial_commit: bool) -> Option<&'static str> {
    if !options.stash_enabled() {
        if options.diff.is_some() {
            return Some(messages::SKIPPING_BACKUP_DIFF);
        }
        if options.stash == Some(false) {
            return Some(messages::SKIPPING_BACKUP);
        }
        return None;
    }
    (!has_initial_commit).then_some(messages::SKIPPING_BACKUP_NO_COMMIT)
}

async fn build_groups(
    options: &Options,
    git: &GitClient,
    paths: &RepoPaths,
    cwd: &Path,
    files: &[crate::git::StagedFile],
    ctx: &mut ExecutionContext,
    reporter: &Reporter,
) -> Result<(Vec<GroupRun>, Vec<String>)> {
    let configs = search_configs(options, git, &paths.top_level, cwd).await?;
    let config_groups = group_files(configs, files);
    if config_groups.is_empty() {
        return Err(crate::config::ConfigError::NotFound.into());
    }

    if config_groups
        .iter()
        .any(|group| group.config.commands.uses_git_add())
    {
        reporter.warn(messages::GIT_ADD_WARNING);
    }

    let max_arg_length = options
        .max_arg_length
        .unwrap_or_else(default_max_arg_length);
    let mut groups = Vec::with_capacity(config_groups.len());
    let mut matched_files: Vec<String> = Vec::new();

    for group in &config_groups {
        let dir = &group.config.dir;
        let task_options = TaskOptions {
            cwd: dir.clone(),
            top_level: paths.top_level.clone(),
            max_arg_length,
            shell: options.shell,
        };

        let mut patterns = Vec::new();
        for (pattern, spec) in group.config.commands.iter() {
            let matched = match_files(dir, pattern, &group.files)?;
            if matched.is_empty() {
                let reason = messages::no_files_match(pattern);
                reporter.skipped(pattern, &reason);
                ctx.skip(pattern.clone(), reason);
                continue;
            }

            let file_args: Vec<String> = matched
                .iter()
                .map(|file| {
                    if options.relative {
                        relative_path(dir, Path::new(&file.path))
                    } else {
                        file.path.clone()
                    }
                })
                .collect();

            let tasks = build_tasks(spec, &file_args, &task_options).await?;
            for file in matched {
                if !matched_files.contains(&file.path) {
                    matched_files.push(file.path);
                }
            }
            patterns.push(PatternRun {
                title: format!("{pattern}: {} file(s)", file_args.len()),
                tasks,
            });
        }

        if !patterns.is_empty() {
            groups.push(GroupRun {
                title: group.config.display_name(),
                patterns,
            });
        }
    }

    Ok((groups, matched_files))
}

async fn plan_run(
    options: &Options,
    git: &GitClient,
    cwd: &Path,
    ctx: &mut ExecutionContext,
    reporter: &Reporter,
) -> Result<Plan> {
    let paths = git.resolve_paths().await?;
    tracing::debug!("Resolved git directory to {}", paths.git_dir.display());

    let has_initial_commit = git.in_dir(&paths.top_level).has_initial_commit().await;
    if let Some(warning) = backup_warning(options, has_initial_commit) {
        reporter.warn(warning);
    }
    if options.hide_partially_staged == Some(false) {
        reporter.warn(messages::SKIPPING_HIDE_PARTIALLY_STAGED);
    }
    let should_backup = options.stash_enabled() && has_initial_commit;

    let query = StagedFilesQuery {
        diff: options.diff.clone(),
        diff_filter: options.diff_filter.clone(),
        all: options.all,
    };
    let files = get_staged_files(git, &paths.top_level, &query)
        .await
        .map_err(|e| {
            StageGateError::git(
                ErrorCode::GIT_COMMAND_FAILED,
                messages::FAILED_GET_STAGED_FILES,
                "staged files",
            )
            .with_source(e)
        })?;
    if files.is_empty() {
        return Ok(Plan::Finished(messages::NO_STAGED_FILES));
    }

    let (groups, matched_files) =
        build_groups(options, git, &paths, cwd, &files, ctx, reporter).await?;
    if groups.is_empty() {
        return Ok(Plan::Finished(messages::NO_TASKS));
    }

    Ok(Plan::Run(RunPlan {
        paths,
        groups,
        matched_files,
        should_backup,
    }))
}

/// Run every configured task against the staged files.
///
/// Nothing in the repository changes before all options, configuration and
/// tasks have been validated.
pub async fn run_all(
    options: &Options,
    subprocess: &SubprocessManager,
    reporter: &Reporter,
) -> std::result::Result<RunSummary, RunFailure> {
    let mut ctx = ExecutionContext::new(false, options.quiet);

    if let Err(e) = options.validate() {
        return Err(RunFailure::new(ctx, e));
    }
    let cwd = match options.resolved_cwd() {
        Ok(cwd) => cwd,
        Err(e) => return Err(RunFailure::new(ctx, e)),
    };
    let git = subprocess.git(&cwd);

    let plan = match plan_run(options, &git, &cwd, &mut ctx, reporter).await {
        Ok(Plan::Run(plan)) => plan,
        Ok(Plan::Finished(message)) => {
            return Ok(RunSummary {
                skipped: ctx.skipped,
                message: Some(message),
                ..Default::default()
            })
        }
        Err(e) => return Err(RunFailure::new(ctx, e)),
    };

    ctx.should_backup = plan.should_backup;
    ctx.should_hide_partially_staged = options.hide_partially_staged_enabled();

    let mut workflow = GitWorkflow::new(
        &git,
        plan.paths,
        WorkflowOptions {
            allow_empty: options.allow_empty,
            query: StagedFilesQuery {
                diff: options.diff.clone(),
                diff_filter: options.diff_filter.clone(),
                all: options.all,
            },
            matched_files: plan.matched_files,
            max_arg_length: options
                .max_arg_length
                .unwrap_or_else(default_max_arg_length),
        },
    );
    let scheduler = TaskScheduler::new(subprocess.runner(), options.concurrent, options.verbose);

    let report = run_phases(&mut workflow, &scheduler, &plan.groups, &mut ctx, reporter).await;

    if ctx.has_errors() {
        tracing::debug!("Run failed with {:?}", ctx.errors);
        return Err(RunFailure {
            context: ctx,
            errors: report.errors,
        });
    }

    Ok(RunSummary {
        tasks: report.tasks,
        skipped: std::mem::take(&mut ctx.skipped),
        output: std::mem::take(&mut ctx.output),
        message: None,
    })
}

/// Print the messages explaining a failed run
pub fn report_failure(failure: &RunFailure, reporter: &Reporter) {
    let ctx = &failure.context;
    for text in &ctx.output {
        reporter.output(text, true);
    }

    if ctx.has(ErrorKind::ApplyEmptyCommit) {
        reporter.error(messages::PREVENTED_EMPTY_COMMIT);
    } else if ctx.has(ErrorKind::Interrupted) {
        reporter.error(messages::INTERRUPTED);
    } else if ctx.has(ErrorKind::Git) {
        for error in &failure.errors {
            reporter.error(&error.user_message());
        }
        if ctx.should_backup {
            reporter.error(messages::GIT_ERROR);
            reporter.output(messages::RESTORE_STASH_EXAMPLE, true);
        }
    } else if ctx.has(ErrorKind::ConfigNotFound) {
        reporter.error(messages::CONFIG_NOT_FOUND);
    } else if ctx.has(ErrorKind::Task) {
        reporter.error(messages::TASK_FAILED);
    } else {
        for error in &failure.errors {
            reporter.error(&error.user_message());
        }
    }
}

/// Run with real processes and print the outcome; `true` on success
pub async fn run(options: &Options, reporter: &Reporter) -> bool {
    let subprocess = SubprocessManager::production();
    match run_all(options, &subprocess, reporter).await {
        Ok(summary) => {
            for text in &summary.output {
                reporter.output(text, false);
            }
            if let Some(message) = summary.message {
                reporter.info(message);
            }
            true
        }
        Err(failure) => {
            tracing::debug!("{}", failure);
            for error in &failure.errors {
                tracing::debug!("{}: {}", error, describe_error_code(error.code()));
            }
            report_failure(&failure, reporter);
            false
        }
    }
}
