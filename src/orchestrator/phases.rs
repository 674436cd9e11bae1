//! The phase sequence of a run once tasks are built.
//!
//! Each phase consults the rules in [`crate::state`] and either runs or is
//! reported as skipped with its reason. The transaction records its own
//! failures in the context, so later rules see them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::cancel::CancellationToken;
use crate::context::ExecutionContext;
use crate::error::{ErrorKind, Result, StageGateError};
use crate::git::StagingTransaction;
use crate::report::Reporter;
use crate::state;
use crate::tasks::{GroupRun, TaskScheduler, TaskSummary};

pub const PREPARE_TITLE: &str = "Preparing stagegate...";
pub const HIDE_TITLE: &str = "Hiding unstaged changes to partially staged files...";
pub const TASKS_TITLE: &str = "Running tasks for staged files...";
pub const APPLY_TITLE: &str = "Applying modifications from tasks...";
pub const RESTORE_UNSTAGED_TITLE: &str = "Restoring unstaged changes to partially staged files...";
pub const RESTORE_ORIGINAL_TITLE: &str = "Reverting to original state because of errors...";
pub const CLEANUP_TITLE: &str = "Cleaning up temporary files...";

/// What happened after the transaction started
#[derive(Debug, Default)]
pub struct PhaseReport {
    pub tasks: TaskSummary,
    /// Errors raised by transaction steps, in order
    pub errors: Vec<StageGateError>,
}

/// Cancels the run on Ctrl-C while tasks are running
struct InterruptListener {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl InterruptListener {
    fn spawn(cancel: CancellationToken) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn({
            let fired = Arc::clone(&fired);
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::debug!("Received interrupt, cancelling running tasks");
                    fired.store(true, Ordering::SeqCst);
                    cancel.cancel();
                }
            }
        });
        Self { handle, fired }
    }

    fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn step<F>(
    reporter: &Reporter,
    title: &str,
    errors: &mut Vec<StageGateError>,
    phase: F,
) -> bool
where
    F: Future<Output = Result<()>>,
{
    reporter.started(title);
    match phase.await {
        Ok(()) => {
            reporter.completed(title);
            true
        }
        Err(e) => {
            reporter.failed(title);
            errors.push(e);
            false
        }
    }
}

async fn run_tasks(
    scheduler: &TaskScheduler,
    groups: &[GroupRun],
    ctx: &mut ExecutionContext,
    reporter: &Reporter,
) -> TaskSummary {
    reporter.started(TASKS_TITLE);

    let interrupt = InterruptListener::spawn(ctx.events.clone());
    let summary = scheduler.run(groups, ctx, reporter).await;
    if interrupt.fired() {
        ctx.add_error(ErrorKind::Interrupted);
        ctx.add_error(ErrorKind::Task);
    }
    drop(interrupt);

    if ctx.has(ErrorKind::Task) {
        reporter.failed(TASKS_TITLE);
    } else {
        reporter.completed(TASKS_TITLE);
    }
    summary
}

/// Drive `tx` and the scheduler through every phase of a run
pub async fn run_phases(
    tx: &mut dyn StagingTransaction,
    scheduler: &TaskScheduler,
    groups: &[GroupRun],
    ctx: &mut ExecutionContext,
    reporter: &Reporter,
) -> PhaseReport {
    let mut report = PhaseReport::default();

    if !step(reporter, PREPARE_TITLE, &mut report.errors, tx.prepare(ctx)).await {
        // Leave any backup in place; it is the only way back
        if let Err(e) = tx.cleanup(ctx, false).await {
            report.errors.push(e);
        }
        return report;
    }

    if state::hide_unstaged_changes_enabled(ctx) {
        step(
            reporter,
            HIDE_TITLE,
            &mut report.errors,
            tx.hide_unstaged_changes(ctx),
        )
        .await;
    }

    match state::tasks_skipped(ctx) {
        Some(reason) => reporter.skipped(TASKS_TITLE, reason),
        None => report.tasks = run_tasks(scheduler, groups, ctx, reporter).await,
    }
    tx.tasks_finished();

    match state::apply_modifications_skipped(ctx) {
        Some(reason) => reporter.skipped(APPLY_TITLE, reason),
        None => {
            step(
                reporter,
                APPLY_TITLE,
                &mut report.errors,
                tx.apply_modifications(ctx),
            )
            .await;
        }
    }

    if state::restore_unstaged_changes_enabled(ctx) {
        match state::restore_unstaged_changes_skipped(ctx) {
            Some(reason) => reporter.skipped(RESTORE_UNSTAGED_TITLE, reason),
            None => {
                step(
                    reporter,
                    RESTORE_UNSTAGED_TITLE,
                    &mut report.errors,
                    tx.restore_unstaged_changes(ctx),
                )
                .await;
            }
        }
    }

    if state::restore_original_state_enabled(ctx) {
        match state::restore_original_state_skipped(ctx) {
            Some(reason) => reporter.skipped(RESTORE_ORIGINAL_TITLE, reason),
            None => {
                step(
                    reporter,
                    RESTORE_ORIGINAL_TITLE,
                    &mut report.errors,
                    tx.restore_original_state(ctx),
                )
                .await;
            }
        }
    }

    let drop_backup = state::cleanup_enabled(ctx)
        && match state::cleanup_skipped(ctx) {
            Some(reason) => {
                reporter.skipped(CLEANUP_TITLE, reason);
                false
            }
            None => true,
        };

    if drop_backup {
        step(
            reporter,
            CLEANUP_TITLE,
            &mut report.errors,
            tx.cleanup(ctx, true),
        )
        .await;
    } else if let Err(e) = tx.cleanup(ctx, false).await {
        report.errors.push(e);
    }

    report
}
