//! Running tasks with bounded concurrency
//!
//! Every invocation takes a permit from one shared semaphore, so the process
//! limit holds across chunks, patterns and configuration groups alike.
//! Commands of the same pattern run in order; patterns and groups run side
//! by side unless concurrency is disabled. The first failing invocation
//! cancels the run-wide token: running processes are killed along with
//! their descendants and tasks that have not started are skipped.
//!
//! Outcomes are collected first and folded into the [`ExecutionContext`]
//! afterwards, one at a time.

use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::{Invocation, Task};
use crate::cancel::CancellationToken;
use crate::config::Concurrency;
use crate::context::ExecutionContext;
use crate::error::ErrorKind;
use crate::messages::SKIPPED_INTERRUPTED;
use crate::report::Reporter;
use crate::subprocess::{ExitStatus, ProcessCommandBuilder, ProcessError, ProcessOutput, ProcessRunner};

/// The tasks configured for one pattern, run in order
#[derive(Debug, Clone)]
pub struct PatternRun {
    pub title: String,
    pub tasks: Vec<Task>,
}

/// All patterns of one configuration
#[derive(Debug, Clone)]
pub struct GroupRun {
    pub title: String,
    pub patterns: Vec<PatternRun>,
}

/// One invocation that did not succeed
#[derive(Debug, Clone)]
pub struct InvocationFailure {
    pub command: String,
    /// `None` when the process never ran
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    /// Stopped because another task failed or the run was interrupted
    pub killed: bool,
    /// Spawn or I/O error, if that is why it failed
    pub error: Option<String>,
}

impl InvocationFailure {
    fn killed(command: String) -> Self {
        Self {
            command,
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            killed: true,
            error: None,
        }
    }

    fn from_error(command: String, error: String) -> Self {
        Self {
            command,
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            killed: false,
            error: Some(error),
        }
    }

    fn from_output(command: String, output: ProcessOutput) -> Self {
        Self {
            command,
            status: Some(output.status),
            stdout: output.stdout,
            stderr: output.stderr,
            killed: output.cancelled,
            error: None,
        }
    }

    fn tag(&self) -> String {
        if self.killed {
            return "KILLED".to_string();
        }
        match (&self.status, &self.error) {
            (Some(status), _) => status.to_string(),
            (None, Some(error)) => error.clone(),
            (None, None) => "FAILED".to_string(),
        }
    }
}

/// Every failed invocation of one task, reported together
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub title: String,
    pub command: String,
    pub failures: Vec<InvocationFailure>,
}

impl TaskFailure {
    /// Whether the task only failed because it was cancelled
    pub fn was_killed(&self) -> bool {
        self.failures.iter().all(|f| f.killed)
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.was_killed() {
            return write!(f, "{} [KILLED]", self.command);
        }

        let mut first = true;
        for failure in self.failures.iter().filter(|failure| !failure.killed) {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{} [{}]", self.command, failure.tag())?;
            for stream in [&failure.stdout, &failure.stderr] {
                let text = stream.trim_end();
                if !text.is_empty() {
                    write!(f, "\n{text}")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Succeeded {
        title: String,
        /// Captured output, kept only in verbose mode
        output: Option<String>,
    },
    Failed(TaskFailure),
    Skipped { title: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub killed: usize,
    pub skipped: usize,
}

pub struct TaskScheduler {
    runner: Arc<dyn ProcessRunner>,
    semaphore: Arc<Semaphore>,
    concurrency: Concurrency,
    verbose: bool,
}

impl TaskScheduler {
    pub fn new(runner: Arc<dyn ProcessRunner>, concurrency: Concurrency, verbose: bool) -> Self {
        let permits = concurrency.permits().max(1);
        tracing::debug!("Running tasks with up to {} process(es)", permits);
        Self {
            runner,
            semaphore: Arc::new(Semaphore::new(permits)),
            concurrency,
            verbose,
        }
    }

    /// Run every group and record the outcomes in `ctx`
    pub async fn run(
        &self,
        groups: &[GroupRun],
        ctx: &mut ExecutionContext,
        reporter: &Reporter,
    ) -> TaskSummary {
        let cancel = ctx.events.clone();

        let outcomes: Vec<TaskOutcome> = if self.concurrency.is_sequential() {
            let mut outcomes = Vec::new();
            for group in groups {
                outcomes.extend(self.run_group(group, &cancel, reporter).await);
            }
            outcomes
        } else {
            join_all(
                groups
                    .iter()
                    .map(|group| self.run_group(group, &cancel, reporter)),
            )
            .await
            .into_iter()
            .flatten()
            .collect()
        };

        Self::record(outcomes, ctx)
    }

    fn record(outcomes: Vec<TaskOutcome>, ctx: &mut ExecutionContext) -> TaskSummary {
        let mut summary = TaskSummary::default();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Succeeded { output, .. } => {
                    summary.succeeded += 1;
                    ctx.output.extend(output);
                }
                TaskOutcome::Failed(failure) => {
                    if failure.was_killed() {
                        summary.killed += 1;
                    } else {
                        summary.failed += 1;
                    }
                    ctx.add_error(ErrorKind::Task);
                    ctx.output.push(failure.to_string());
                }
                TaskOutcome::Skipped { title, reason } => {
                    summary.skipped += 1;
                    ctx.skip(title, reason);
                }
            }
        }
        summary
    }

    async fn run_group(
        &self,
        group: &GroupRun,
        cancel: &CancellationToken,
        reporter: &Reporter,
    ) -> Vec<TaskOutcome> {
        reporter.started(&group.title);

        let outcomes: Vec<TaskOutcome> = if self.concurrency.is_sequential() {
            let mut outcomes = Vec::new();
            for pattern in &group.patterns {
                outcomes.extend(self.run_pattern(pattern, cancel, reporter).await);
            }
            outcomes
        } else {
            join_all(
                group
                    .patterns
                    .iter()
                    .map(|pattern| self.run_pattern(pattern, cancel, reporter)),
            )
            .await
            .into_iter()
            .flatten()
            .collect()
        };

        if outcomes
            .iter()
            .any(|o| matches!(o, TaskOutcome::Failed(_)))
        {
            reporter.failed(&group.title);
        } else {
            reporter.completed(&group.title);
        }
        outcomes
    }

    async fn run_pattern(
        &self,
        pattern: &PatternRun,
        cancel: &CancellationToken,
        reporter: &Reporter,
    ) -> Vec<TaskOutcome> {
        tracing::debug!("Running {} task(s) for {}", pattern.tasks.len(), pattern.title);
        let mut outcomes = Vec::with_capacity(pattern.tasks.len());
        for task in &pattern.tasks {
            if cancel.is_cancelled() {
                reporter.skipped(&task.title, SKIPPED_INTERRUPTED);
                outcomes.push(TaskOutcome::Skipped {
                    title: task.title.clone(),
                    reason: SKIPPED_INTERRUPTED.to_string(),
                });
                continue;
            }

            reporter.started(&task.title);
            let outcome = self.run_task(task, cancel).await;
            match &outcome {
                TaskOutcome::Failed(_) => reporter.failed(&task.title),
                _ => reporter.completed(&task.title),
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_task(&self, task: &Task, cancel: &CancellationToken) -> TaskOutcome {
        let results = join_all(
            task.invocations
                .iter()
                .map(|invocation| self.run_invocation(invocation, cancel)),
        )
        .await;

        let mut failures = Vec::new();
        let mut captured = Vec::new();
        for result in results {
            match result {
                Ok(output) => {
                    for stream in [output.stdout, output.stderr] {
                        let text = stream.trim_end();
                        if !text.is_empty() {
                            captured.push(text.to_string());
                        }
                    }
                }
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            return TaskOutcome::Failed(TaskFailure {
                title: task.title.clone(),
                command: task.command.clone(),
                failures,
            });
        }

        let output = (self.verbose && !captured.is_empty())
            .then(|| format!("{}:\n{}", task.title, captured.join("\n")));
        TaskOutcome::Succeeded {
            title: task.title.clone(),
            output,
        }
    }

    fn fail_fast(cancel: &CancellationToken, command: &str) {
        if cancel.cancel() {
            tracing::debug!("{} failed, cancelling remaining tasks", command);
        }
    }

    async fn run_invocation(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, InvocationFailure> {
        let display = invocation.command_line();

        let permit = tokio::select! {
            permit = self.semaphore.acquire() => permit,
            _ = cancel.cancelled() => return Err(InvocationFailure::killed(display)),
        };
        let _permit = match permit {
            Ok(permit) => permit,
            Err(e) => {
                Self::fail_fast(cancel, &display);
                return Err(InvocationFailure::from_error(display, e.to_string()));
            }
        };

        let command = ProcessCommandBuilder::new(&invocation.program)
            .args(&invocation.args)
            .files(&invocation.files)
            .current_dir(&invocation.cwd)
            .build();

        match self.runner.run_cancellable(command, cancel).await {
            Ok(output) if output.status.success() && !output.cancelled => Ok(output),
            Ok(output) => {
                let failure = InvocationFailure::from_output(display, output);
                if !failure.killed {
                    Self::fail_fast(cancel, &failure.command);
                }
                Err(failure)
            }
            Err(ProcessError::Cancelled { .. }) => Err(InvocationFailure::killed(display)),
            Err(e) => {
                Self::fail_fast(cancel, &display);
                Err(InvocationFailure::from_error(display, e.to_string()))
            }
        }
    }
}
