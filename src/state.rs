//! Phase rules.
//!
//! Pure functions of the [`ExecutionContext`] deciding whether a phase runs.
//! `*_skipped` functions return the reason shown to the user, `None` when the
//! phase should run.

use crate::context::ExecutionContext;
use crate::error::ErrorKind;
use crate::messages::{SKIPPED_GIT_ERROR, SKIPPED_TASK_ERROR};

fn git_error_without_recovery(ctx: &ExecutionContext) -> bool {
    ctx.has(ErrorKind::Git)
        && !ctx.has(ErrorKind::ApplyEmptyCommit)
        && !ctx.has(ErrorKind::RestoreUnstagedChanges)
}

pub fn hide_unstaged_changes_enabled(ctx: &ExecutionContext) -> bool {
    ctx.has_partially_staged_files && ctx.should_hide_partially_staged
}

pub fn tasks_skipped(ctx: &ExecutionContext) -> Option<&'static str> {
    ctx.has(ErrorKind::Git).then_some(SKIPPED_GIT_ERROR)
}

pub fn apply_modifications_skipped(ctx: &ExecutionContext) -> Option<&'static str> {
    // Without a backup there is nothing to roll back to, so task fixes are always kept
    if !ctx.should_backup {
        return None;
    }
    if ctx.has(ErrorKind::Git) {
        return Some(SKIPPED_GIT_ERROR);
    }
    if ctx.has(ErrorKind::Task) {
        return Some(SKIPPED_TASK_ERROR);
    }
    None
}

pub fn restore_unstaged_changes_enabled(ctx: &ExecutionContext) -> bool {
    hide_unstaged_changes_enabled(ctx)
}

pub fn restore_unstaged_changes_skipped(ctx: &ExecutionContext) -> Option<&'static str> {
    if ctx.has(ErrorKind::Git) {
        return Some(SKIPPED_GIT_ERROR);
    }
    if ctx.should_backup && ctx.has(ErrorKind::Task) {
        return Some(SKIPPED_TASK_ERROR);
    }
    None
}

pub fn restore_original_state_enabled(ctx: &ExecutionContext) -> bool {
    ctx.should_backup
        && (ctx.has(ErrorKind::Task)
            || ctx.has(ErrorKind::ApplyEmptyCommit)
            || ctx.has(ErrorKind::RestoreUnstagedChanges))
}

pub fn restore_original_state_skipped(ctx: &ExecutionContext) -> Option<&'static str> {
    git_error_without_recovery(ctx).then_some(SKIPPED_GIT_ERROR)
}

pub fn cleanup_enabled(ctx: &ExecutionContext) -> bool {
    ctx.should_backup
}

/// Reason to keep the backup stash instead of dropping it
pub fn cleanup_skipped(ctx: &ExecutionContext) -> Option<&'static str> {
    if git_error_without_recovery(ctx) || ctx.has(ErrorKind::RestoreOriginalState) {
        return Some(SKIPPED_GIT_ERROR);
    }
    None
}
